/// A unit of work executed exactly once by a pool worker.
pub trait Task: Send {
    fn execute(self: Box<Self>);
}

pub type Job = Box<dyn Task + 'static>;

impl<F> Task for F
where
    F: FnOnce() + Send,
{
    fn execute(self: Box<Self>) {
        (*self)()
    }
}

/// Callable that can be applied to an argument tuple.
///
/// Implemented for every `FnOnce` taking up to eight arguments, so that
/// `bind(f, (a, b))` works for a plain `fn f(a: A, b: B)`.
pub trait Invoke<Args>: Send {
    fn invoke(self, args: Args);
}

macro_rules! impl_invoke {
    ($($arg:ident),*) => {
        impl<Func, $($arg,)*> Invoke<($($arg,)*)> for Func
        where
            Func: FnOnce($($arg),*) + Send,
        {
            #[allow(non_snake_case)]
            fn invoke(self, ($($arg,)*): ($($arg,)*)) {
                self($($arg),*)
            }
        }
    };
}

impl_invoke!();
impl_invoke!(A);
impl_invoke!(A, B);
impl_invoke!(A, B, C);
impl_invoke!(A, B, C, D);
impl_invoke!(A, B, C, D, E);
impl_invoke!(A, B, C, D, E, G);
impl_invoke!(A, B, C, D, E, G, H);
impl_invoke!(A, B, C, D, E, G, H, I);

pub struct Bound<F, Args> {
    func: F,
    args: Args,
}

impl<F, Args> Task for Bound<F, Args>
where
    F: Invoke<Args>,
    Args: Send,
{
    fn execute(self: Box<Self>) {
        let Bound { func, args } = *self;
        func.invoke(args);
    }
}

/// Binds `func` with `args` into a task. Arguments are moved into the task
/// and handed to `func` when a worker executes it.
pub fn bind<F, Args>(func: F, args: Args) -> Bound<F, Args>
where
    F: Invoke<Args>,
    Args: Send,
{
    Bound { func, args }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn record(log: Arc<Mutex<Vec<String>>>, greeting: &str, count: usize) {
        log.lock().unwrap().push(format!("{} x{}", greeting, count));
    }

    #[test]
    fn closure_is_a_task() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_ref = log.clone();
        let job: Job = Box::new(move || log_ref.lock().unwrap().push("closure".to_string()));

        job.execute();

        assert_eq!(*log.lock().unwrap(), vec!["closure".to_string()]);
    }

    #[test]
    fn bound_function_receives_arguments() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let job: Job = Box::new(bind(record, (log.clone(), "hello", 3usize)));

        job.execute();

        assert_eq!(*log.lock().unwrap(), vec!["hello x3".to_string()]);
    }

    #[test]
    fn bind_without_arguments() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_ref = log.clone();
        let job: Job = Box::new(bind(move || log_ref.lock().unwrap().push("empty".to_string()), ()));

        job.execute();

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    // Arguments are owned by the task until it runs.
    #[test]
    fn bound_arguments_dropped_with_task() {
        let marker = Arc::new(());
        let job: Job = Box::new(bind(|_: Arc<()>| {}, (marker.clone(),)));
        assert_eq!(Arc::strong_count(&marker), 2);

        drop(job);
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
