//! Single-resolution completion handles.
//!
//! A `Resolver` settles exactly once: `resolve` and `reject` take it by value,
//! so a second settlement does not compile. Any number of `Promise` clones can
//! observe the outcome, and callbacks attached after settlement run
//! immediately.

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Resolved,
    Rejected,
}

type Callback<T, E> = Box<dyn FnOnce(Result<&T, &E>) + Send>;

enum Settlement<T, E> {
    Pending,
    Resolved(Arc<T>),
    Rejected(Arc<E>),
}

impl<T, E> Clone for Settlement<T, E> {
    fn clone(&self) -> Self {
        match self {
            Settlement::Pending => Settlement::Pending,
            Settlement::Resolved(v) => Settlement::Resolved(Arc::clone(v)),
            Settlement::Rejected(e) => Settlement::Rejected(Arc::clone(e)),
        }
    }
}

struct Inner<T, E> {
    settlement: Settlement<T, E>,
    callbacks: Vec<Callback<T, E>>,
}

type Shared<T, E> = Arc<Mutex<Inner<T, E>>>;

/// The write side. Dropping it without settling leaves every promise pending.
pub struct Resolver<T, E> {
    shared: Shared<T, E>,
}

/// The read side.
pub struct Promise<T, E> {
    shared: Shared<T, E>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> std::fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("state", &state_of(&self.shared.lock().settlement))
            .finish()
    }
}

impl<T, E> std::fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

fn state_of<T, E>(settlement: &Settlement<T, E>) -> PromiseState {
    match settlement {
        Settlement::Pending => PromiseState::Pending,
        Settlement::Resolved(_) => PromiseState::Resolved,
        Settlement::Rejected(_) => PromiseState::Rejected,
    }
}

/// Create a connected resolver/promise pair.
pub fn deferred<T, E>() -> (Resolver<T, E>, Promise<T, E>)
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let shared = Arc::new(Mutex::new(Inner {
        settlement: Settlement::Pending,
        callbacks: Vec::new(),
    }));
    (
        Resolver {
            shared: Arc::clone(&shared),
        },
        Promise { shared },
    )
}

impl<T, E> Resolver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn promise(&self) -> Promise<T, E> {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn resolve(self, value: T) {
        settle(&self.shared, Settlement::Resolved(Arc::new(value)));
    }

    pub fn reject(self, error: E) {
        settle(&self.shared, Settlement::Rejected(Arc::new(error)));
    }
}

fn settle<T, E>(shared: &Shared<T, E>, outcome: Settlement<T, E>) {
    let callbacks = {
        let mut inner = shared.lock();
        if !matches!(inner.settlement, Settlement::Pending) {
            return;
        }
        inner.settlement = outcome.clone();
        std::mem::take(&mut inner.callbacks)
    };
    for callback in callbacks {
        run(callback, &outcome);
    }
}

fn run<T, E>(callback: Callback<T, E>, outcome: &Settlement<T, E>) {
    match outcome {
        Settlement::Resolved(v) => callback(Ok(v)),
        Settlement::Rejected(e) => callback(Err(e)),
        Settlement::Pending => {}
    }
}

impl<T, E> Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// A promise that is already resolved.
    pub fn resolved(value: T) -> Self {
        let (resolver, promise) = deferred();
        resolver.resolve(value);
        promise
    }

    /// A promise that is already rejected.
    pub fn rejected(error: E) -> Self {
        let (resolver, promise) = deferred();
        resolver.reject(error);
        promise
    }

    pub fn state(&self) -> PromiseState {
        state_of(&self.shared.lock().settlement)
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == PromiseState::Resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == PromiseState::Rejected
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<Arc<T>> {
        match &self.shared.lock().settlement {
            Settlement::Resolved(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    /// The rejection reason, if any.
    pub fn error(&self) -> Option<Arc<E>> {
        match &self.shared.lock().settlement {
            Settlement::Rejected(e) => Some(Arc::clone(e)),
            _ => None,
        }
    }

    /// Run `callback` once the promise settles, either way.
    pub fn on_settle<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(Result<&T, &E>) + Send + 'static,
    {
        let settled = {
            let mut inner = self.shared.lock();
            match inner.settlement {
                Settlement::Pending => {
                    inner.callbacks.push(Box::new(callback));
                    return self;
                }
                ref s => s.clone(),
            }
        };
        run(Box::new(callback), &settled);
        self
    }

    pub fn done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.on_settle(move |outcome| {
            if let Ok(v) = outcome {
                callback(v);
            }
        })
    }

    pub fn fail<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&E) + Send + 'static,
    {
        self.on_settle(move |outcome| {
            if let Err(e) = outcome {
                callback(e);
            }
        })
    }

    pub fn always<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(PromiseState) + Send + 'static,
    {
        self.on_settle(move |outcome| {
            callback(match outcome {
                Ok(_) => PromiseState::Resolved,
                Err(_) => PromiseState::Rejected,
            })
        })
    }

    /// Chain a transformation of the resolved value. Rejections pass through.
    pub fn then<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Send + Sync + 'static,
        E: Clone,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let (resolver, promise) = deferred();
        self.on_settle(move |outcome| match outcome {
            Ok(v) => resolver.resolve(f(v)),
            Err(e) => resolver.reject(e.clone()),
        });
        promise
    }
}

struct WhenState<T, E> {
    values: Vec<Option<T>>,
    remaining: usize,
    resolver: Option<Resolver<Vec<T>, E>>,
}

/// Resolve once every promise resolves; reject on the first rejection.
pub fn when<T, E, I>(promises: I) -> Promise<Vec<T>, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    let (resolver, aggregate) = deferred();
    if promises.is_empty() {
        resolver.resolve(Vec::new());
        return aggregate;
    }

    let state = Arc::new(Mutex::new(WhenState {
        values: vec![None; promises.len()],
        remaining: promises.len(),
        resolver: Some(resolver),
    }));

    for (index, promise) in promises.iter().enumerate() {
        let state = Arc::clone(&state);
        promise.on_settle(move |outcome| {
            let finished = {
                let mut s = state.lock();
                match outcome {
                    Ok(v) => {
                        s.values[index] = Some(v.clone());
                        s.remaining -= 1;
                        if s.remaining == 0 {
                            let values = s.values.iter_mut().filter_map(Option::take).collect();
                            s.resolver.take().map(|r| (r, Ok(values)))
                        } else {
                            None
                        }
                    }
                    Err(e) => s.resolver.take().map(|r| (r, Err(e.clone()))),
                }
            };
            match finished {
                Some((r, Ok(values))) => r.resolve(values),
                Some((r, Err(e))) => r.reject(e),
                None => {}
            }
        });
    }

    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_fire_once_on_resolution() {
        let (resolver, promise) = deferred::<u32, ()>();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        promise.done(move |v| {
            assert_eq!(*v, 7);
            h.fetch_add(1, Ordering::SeqCst);
        });
        let h = Arc::clone(&hits);
        promise.fail(move |_| {
            h.fetch_add(100, Ordering::SeqCst);
        });

        assert!(promise.is_pending());
        resolver.resolve(7);
        assert!(promise.is_resolved());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_callbacks_run_immediately() {
        let promise = Promise::<(), &'static str>::rejected("stopped");
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        promise.fail(move |e| *s.lock() = Some(*e));
        assert_eq!(*seen.lock(), Some("stopped"));
        assert_eq!(promise.state(), PromiseState::Rejected);
    }

    #[test]
    fn then_maps_values_and_forwards_rejection() {
        let (resolver, promise) = deferred::<u32, String>();
        let doubled = promise.then(|v| v * 2);
        resolver.resolve(21);
        assert_eq!(doubled.value().as_deref(), Some(&42));

        let (resolver, promise) = deferred::<u32, String>();
        let mapped = promise.then(|v| v + 1);
        resolver.reject("nope".to_string());
        assert_eq!(mapped.error().as_deref().map(String::as_str), Some("nope"));
    }

    #[test]
    fn when_waits_for_all() {
        let (r1, p1) = deferred::<u8, ()>();
        let (r2, p2) = deferred::<u8, ()>();
        let all = when([p1, p2]);

        r2.resolve(2);
        assert!(all.is_pending());
        r1.resolve(1);
        assert_eq!(all.value().as_deref(), Some(&vec![1, 2]));
    }

    #[test]
    fn when_rejects_on_first_failure() {
        let (r1, p1) = deferred::<u8, u8>();
        let (r2, p2) = deferred::<u8, u8>();
        let all = when([p1, p2]);
        r1.reject(9);
        r2.resolve(2);
        assert_eq!(all.error().as_deref(), Some(&9));
    }

    #[test]
    fn empty_when_resolves() {
        let all = when(Vec::<Promise<u8, ()>>::new());
        assert!(all.is_resolved());
    }
}
