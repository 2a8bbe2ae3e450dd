//! Generic observer trait and implementations.

use std::marker::PhantomData;

/// Generic observer trait.
///
/// Type parameter `T` is the event type, allowing different components
/// to publish different events while sharing the same hook pattern.
/// Observers are called from worker tasks and must not block.
pub trait Observer<T>: Send + Sync {
    /// Called once per published event.
    ///
    /// # Arguments
    /// * `event` - The event being published
    fn notify(&self, event: &T);
}

/// An observer that ignores every event.
pub struct NoOpObserver;

impl<T> Observer<T> for NoOpObserver {
    fn notify(&self, _event: &T) {}
}

/// An observer that wraps a closure.
pub struct FnObserver<F, T> {
    callback: F,
    _marker: PhantomData<fn(&T)>,
}

impl<F, T> FnObserver<F, T>
where
    F: Fn(&T) + Send + Sync,
{
    /// Create a new closure-based observer.
    ///
    /// # Arguments
    /// * `callback` - Closure invoked with every event
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _marker: PhantomData,
        }
    }
}

impl<F, T> Observer<T> for FnObserver<F, T>
where
    F: Fn(&T) + Send + Sync,
{
    fn notify(&self, event: &T) {
        (self.callback)(event)
    }
}

/// Create an observer from a closure.
///
/// # Arguments
/// * `f` - Closure invoked with every event
///
/// # Returns
/// A `FnObserver` wrapper implementing `Observer<T>`.
pub fn observer_fn<F, T>(f: F) -> FnObserver<F, T>
where
    F: Fn(&T) + Send + Sync,
{
    FnObserver::new(f)
}
