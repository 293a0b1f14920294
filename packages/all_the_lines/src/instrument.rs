//! Wrappers that bracket profiled callables with a [`SessionGate`].
//!
//! Each wrapper activates the gate for exactly one logical unit of work of the wrapped
//! callable. For a plain function that is the whole call. Generators and futures can suspend,
//! so their wrappers bracket each resumption separately and the gate is never held while the
//! callable is suspended.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::{FunctionId, SessionGate};

/// How a profiled callable executes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum CallableKind {
    /// Runs to completion in one call.
    Function,

    /// Produces values one resumption at a time and may accept a value on each resumption.
    Generator,

    /// Produces a future that makes progress one poll at a time.
    Coroutine,
}

/// A computation that suspends after producing each value.
///
/// The first resumption receives `None`. Later resumptions may send a value into the
/// generator, which it observes as the result of its previous yield. Returning `None` means
/// the generator has finished.
///
/// Every [`Iterator`] is a generator that does not accept sent values.
pub trait Generator {
    /// The values produced at each suspension point.
    type Yield;

    /// The values that can be sent in on resumption.
    type Resume;

    /// Runs the generator until it produces its next value or finishes.
    fn resume(&mut self, sent: Option<Self::Resume>) -> Option<Self::Yield>;
}

impl<I: Iterator> Generator for I {
    type Yield = I::Item;
    type Resume = Infallible;

    fn resume(&mut self, _sent: Option<Infallible>) -> Option<I::Item> {
        self.next()
    }
}

/// A profiled plain function.
///
/// Created by [`Profiler::wrap_function()`](crate::Profiler::wrap_function).
pub struct InstrumentedFn<F> {
    function: FunctionId,
    gate: Arc<SessionGate>,
    inner: F,
}

impl<F> InstrumentedFn<F> {
    pub(crate) fn new(function: FunctionId, gate: Arc<SessionGate>, inner: F) -> Self {
        Self {
            function,
            gate,
            inner,
        }
    }

    /// The identity of the wrapped function.
    #[must_use]
    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    /// Always [`CallableKind::Function`].
    #[must_use]
    pub fn kind(&self) -> CallableKind {
        CallableKind::Function
    }

    /// Calls the wrapped function with the gate active for the duration of the call.
    ///
    /// The result is returned unchanged. If the function panics, the gate is exited before
    /// the panic continues to unwind.
    pub fn call<Args, R>(&self, args: Args) -> R
    where
        F: Fn(Args) -> R,
    {
        let _guard = self.gate.activate();
        (self.inner)(args)
    }

    /// Like [`call()`](Self::call) but for functions that mutate their captured state.
    pub fn call_mut<Args, R>(&mut self, args: Args) -> R
    where
        F: FnMut(Args) -> R,
    {
        let _guard = self.gate.activate();
        (self.inner)(args)
    }
}

impl<F> fmt::Debug for InstrumentedFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedFn")
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

/// A profiled generator factory.
///
/// Created by [`Profiler::wrap_generator()`](crate::Profiler::wrap_generator). Creating a
/// generator runs none of its body, so [`start()`](Self::start) is not profiled.
pub struct InstrumentedGenerator<F> {
    function: FunctionId,
    gate: Arc<SessionGate>,
    factory: F,
}

impl<F> InstrumentedGenerator<F> {
    pub(crate) fn new(function: FunctionId, gate: Arc<SessionGate>, factory: F) -> Self {
        Self {
            function,
            gate,
            factory,
        }
    }

    /// The identity of the wrapped generator function.
    #[must_use]
    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    /// Always [`CallableKind::Generator`].
    #[must_use]
    pub fn kind(&self) -> CallableKind {
        CallableKind::Generator
    }

    /// Creates a new generator whose resumptions are profiled.
    #[must_use]
    pub fn start<Args, G>(&self, args: Args) -> ProfiledGenerator<G>
    where
        F: Fn(Args) -> G,
        G: Generator,
    {
        ProfiledGenerator {
            gate: Arc::clone(&self.gate),
            inner: (self.factory)(args),
            finished: false,
        }
    }
}

impl<F> fmt::Debug for InstrumentedGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedGenerator")
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

/// A generator whose every resumption runs with the gate active.
///
/// The gate is exited before each produced value is handed to the caller, so nothing is
/// measured while the generator is suspended. After the generator finishes, further
/// resumptions return `None` without resuming it or touching the gate.
///
/// # Examples
///
/// ```
/// use all_the_lines::{Profiler, function_id};
///
/// let profiler = Profiler::new();
/// let countdown = profiler.wrap_generator(function_id!("countdown"), |from: u32| (1..=from).rev());
///
/// let values: Vec<_> = countdown.start(3).collect();
///
/// assert_eq!(values, [3, 2, 1]);
/// assert_eq!(profiler.gate().enable_count(), 0);
/// ```
pub struct ProfiledGenerator<G> {
    gate: Arc<SessionGate>,
    inner: G,
    finished: bool,
}

impl<G: Generator> ProfiledGenerator<G> {
    /// Resumes the generator, optionally sending it a value.
    pub fn resume(&mut self, sent: Option<G::Resume>) -> Option<G::Yield> {
        if self.finished {
            return None;
        }

        let produced = {
            let _guard = self.gate.activate();
            self.inner.resume(sent)
        };

        if produced.is_none() {
            self.finished = true;
        }

        produced
    }

    /// Resumes the generator with a value that becomes the result of its last yield.
    pub fn send(&mut self, value: G::Resume) -> Option<G::Yield> {
        self.resume(Some(value))
    }

    /// Whether the generator has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<G: Generator> Iterator for ProfiledGenerator<G> {
    type Item = G::Yield;

    fn next(&mut self) -> Option<Self::Item> {
        self.resume(None)
    }
}

impl<G> fmt::Debug for ProfiledGenerator<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledGenerator")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// A profiled async function.
///
/// Created by [`Profiler::wrap_coroutine()`](crate::Profiler::wrap_coroutine).
pub struct InstrumentedCoroutine<F> {
    function: FunctionId,
    gate: Arc<SessionGate>,
    factory: F,
}

impl<F> InstrumentedCoroutine<F> {
    pub(crate) fn new(function: FunctionId, gate: Arc<SessionGate>, factory: F) -> Self {
        Self {
            function,
            gate,
            factory,
        }
    }

    /// The identity of the wrapped async function.
    #[must_use]
    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    /// Always [`CallableKind::Coroutine`].
    #[must_use]
    pub fn kind(&self) -> CallableKind {
        CallableKind::Coroutine
    }

    /// Creates the future of one call. Each poll of the future is profiled.
    pub fn call<Args, Fut>(&self, args: Args) -> ProfiledFuture<Fut>
    where
        F: Fn(Args) -> Fut,
        Fut: Future,
    {
        ProfiledFuture {
            gate: Arc::clone(&self.gate),
            inner: Box::pin((self.factory)(args)),
        }
    }
}

impl<F> fmt::Debug for InstrumentedCoroutine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedCoroutine")
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

/// A future whose every poll runs with the gate active.
pub struct ProfiledFuture<Fut> {
    gate: Arc<SessionGate>,
    inner: Pin<Box<Fut>>,
}

impl<Fut: Future> Future for ProfiledFuture<Fut> {
    type Output = Fut::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        let _guard = this.gate.activate();
        this.inner.as_mut().poll(cx)
    }
}

impl<Fut> fmt::Debug for ProfiledFuture<Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledFuture").finish_non_exhaustive()
    }
}
