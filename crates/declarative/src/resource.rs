//! Lifecycle capability for remotely managed resources
//!
//! A resource kind is a value type implementing [`Lifecycle`]. It receives
//! the declared configuration and the last known state on every call and
//! talks to the remote through the client carried by the [`ApplyContext`].

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use std::fmt;

/// Core trait for remotely managed resources
///
/// The five entry points are Create, Read, Update, Delete and Import.
/// Implementations never keep state between calls; everything they need
/// arrives as arguments.
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, Lifecycle, Result};
///
/// #[derive(Debug)]
/// struct BucketResource;
///
/// impl Lifecycle for BucketResource {
///     type Client = BucketClient;
///     type Config = BucketConfig;
///     type State = BucketState;
///
///     fn type_name(&self) -> &'static str {
///         "bucket"
///     }
///
///     fn create(&self, ctx: &mut ApplyContext<'_, BucketClient>, config: &BucketConfig) -> Result<BucketState> {
///         ctx.client.create_bucket(&config.name)
///     }
///
///     // read, update, delete, bind_import, needs_update ...
/// }
/// ```
pub trait Lifecycle: Send + Sync + fmt::Debug {
    /// Remote client capability the resource talks to
    type Client: ?Sized;
    /// Declared configuration
    type Config;
    /// Tracked state
    type State: Clone + fmt::Debug + Send + Sync;

    /// Resource type name, used in addresses and messages
    fn type_name(&self) -> &'static str;

    /// Create the remote entity
    ///
    /// Only the entity itself; mutable attributes are converged afterwards
    /// through [`Lifecycle::update`].
    fn create(
        &self,
        ctx: &mut ApplyContext<'_, Self::Client>,
        config: &Self::Config,
    ) -> Result<Self::State>;

    /// Refresh tracked state from the remote
    ///
    /// Returns `Ok(None)` when the entity no longer exists.
    fn read(
        &self,
        ctx: &mut ApplyContext<'_, Self::Client>,
        state: &Self::State,
    ) -> Result<Option<Self::State>>;

    /// Converge the entity to the declared configuration
    ///
    /// Mutates `state` in place so that partial progress survives a
    /// failure. Immutable attributes are checked before any remote call.
    fn update(
        &self,
        ctx: &mut ApplyContext<'_, Self::Client>,
        config: &Self::Config,
        state: &mut Self::State,
    ) -> Result<()>;

    /// Delete the remote entity
    fn delete(&self, ctx: &mut ApplyContext<'_, Self::Client>, state: &Self::State) -> Result<()>;

    /// Bind an external identifier to the identity attributes of a fresh state
    fn bind_import(&self, id: &str) -> Result<Self::State>;

    /// Import an existing entity: bind the identifier, then read
    fn import(
        &self,
        ctx: &mut ApplyContext<'_, Self::Client>,
        id: &str,
    ) -> Result<Option<Self::State>> {
        let bound = self.bind_import(id)?;
        self.read(ctx, &bound)
    }

    /// Whether the declared configuration differs from tracked state
    fn needs_update(&self, config: &Self::Config, state: &Self::State) -> bool;
}

/// Reject a change to an immutable attribute
pub fn ensure_unchanged<T>(attribute: &str, prior: &T, planned: &T) -> Result<()>
where
    T: PartialEq + fmt::Display + ?Sized,
{
    if prior == planned {
        return Ok(());
    }
    Err(Error::validation(
        format!("Can't mutate {} of existing resource", attribute),
        format!("Can't switch {} {} to {}", attribute, prior, planned),
    ))
}
