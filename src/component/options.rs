//! Component definitions.
//!
//! A component is a [`ComponentOptions`] value shared behind an `Rc`;
//! component nodes compare definitions by identity.
//!
//! ```ignore
//! let counter = Rc::new(ComponentOptions {
//!     name: Some("counter".into()),
//!     data: Some(Rc::new(|| RawObject::map().with("count", 0))),
//!     render: Some(Rc::new(|ctx: &RenderContext| {
//!         VNode::element("span").with_text(ctx.get("count").to_string())
//!     })),
//!     ..Default::default()
//! });
//! ```

use std::fmt;
use std::rc::Rc;

use super::context::{RenderContext, SetupContext};
use crate::reactivity::{RawObject, Reactive};
use crate::renderer::VNode;

/// Produces the component's subtree. Reads through the context are tracked
/// by the component's render effect.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

/// Runs once per instance with read-only props.
pub type SetupFn = Rc<dyn Fn(&Reactive, &SetupContext) -> SetupResult>;

/// Lifecycle callback.
pub type Hook = Rc<dyn Fn(&RenderContext)>;

/// What `setup` hands back.
#[derive(Default)]
pub enum SetupResult {
    #[default]
    None,
    /// Use this render function (replaces `render`).
    Render(RenderFn),
    /// Expose these entries to the render context.
    State(RawObject),
}

impl fmt::Debug for SetupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupResult::None => f.write_str("None"),
            SetupResult::Render(_) => f.write_str("Render(..)"),
            SetupResult::State(state) => f.debug_tuple("State").field(state).finish(),
        }
    }
}

/// Component definition.
#[derive(Clone, Default)]
pub struct ComponentOptions {
    /// Name used in diagnostics.
    pub name: Option<Rc<str>>,
    /// Declared props. Other non-`on*` props become attrs.
    pub props: Vec<Rc<str>>,
    /// Initial state, made deeply reactive per instance.
    pub data: Option<Rc<dyn Fn() -> RawObject>>,
    pub setup: Option<SetupFn>,
    pub render: Option<RenderFn>,

    pub before_create: Option<Rc<dyn Fn()>>,
    pub created: Option<Hook>,
    pub before_mount: Option<Hook>,
    pub mounted: Option<Hook>,
    pub before_update: Option<Hook>,
    pub updated: Option<Hook>,
    pub before_unmount: Option<Hook>,
    pub unmounted: Option<Hook>,
}

impl ComponentOptions {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    /// Whether `key` is a declared prop.
    pub fn declares(&self, key: &str) -> bool {
        self.props.iter().any(|p| &**p == key)
    }
}

impl fmt::Debug for ComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("name", &self.display_name())
            .field("props", &self.props)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}
