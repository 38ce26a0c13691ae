//! Deferred execution on the owning event loop
//!
//! Everything in this crate runs on one logical thread. Work that must not
//! run on the caller's stack (an RDM completion that is known immediately,
//! for example) is handed to an [`Executor`], which runs it on a later turn
//! of the same loop.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce()>;

/// Something that runs tasks after the current call stack has unwound
pub trait Executor {
    /// Queue a task; it must not run before this call returns
    fn execute(&self, task: Task);
}

/// FIFO task queue drained explicitly by the event loop
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued tasks until the queue is empty, including tasks queued
    /// while draining. Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // release the borrow before running so tasks can queue more work
            let next = self.tasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of tasks waiting to run
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Executor for TaskQueue {
    fn execute(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// Span of a call that hands completions to collaborators
///
/// A completion wrapped with [`CallScope::defer`] that fires while the scope
/// is alive is queued on the executor instead of running on the caller's
/// stack. Once the scope drops, wrapped completions run in place.
pub(crate) struct CallScope {
    returned: Rc<Cell<bool>>,
    executor: Rc<dyn Executor>,
}

impl CallScope {
    pub fn new(executor: &Rc<dyn Executor>) -> Self {
        Self {
            returned: Rc::new(Cell::new(false)),
            executor: Rc::clone(executor),
        }
    }

    pub fn defer<T: 'static>(&self, callback: Box<dyn FnOnce(T)>) -> Box<dyn FnOnce(T)> {
        let returned = Rc::clone(&self.returned);
        let executor = Rc::clone(&self.executor);
        Box::new(move |result| {
            if returned.get() {
                callback(result);
            } else {
                executor.execute(Box::new(move || callback(result)));
            }
        })
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        self.returned.set(true);
    }
}
