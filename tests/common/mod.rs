#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_view::component::Hook;
use spark_view::{MemoryHost, NodeHandle, RenderContext, Renderer, Runtime};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// A runtime, a renderer over a [`MemoryHost`], and a `<div>` root.
pub fn setup() -> (Runtime, Renderer<MemoryHost>, NodeHandle) {
    init_tracing();
    let runtime = Runtime::new();
    let mut host = MemoryHost::new();
    let root = host.create_root("div");
    let renderer = Renderer::new(&runtime, host);
    (runtime, renderer, root)
}

pub type Log = Rc<RefCell<Vec<&'static str>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// A hook that appends `label` to `log`.
pub fn record(log: &Log, label: &'static str) -> Option<Hook> {
    let log = Rc::clone(log);
    Some(Rc::new(move |_: &RenderContext| log.borrow_mut().push(label)))
}

pub fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}
