//! Built-in widget library.
//!
//! Every class here derives from [`base_class`](crate::widget::base_class).
//! The library is served as the [`BUILTIN_MODULE`](crate::registry::BUILTIN_MODULE)
//! module by [`module`].

use std::rc::Rc;

use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::Result;
use crate::registry::{Module, BUILTIN_MODULE};
use crate::widget::{base_class, Behavior, Class, Super, WidgetKey};

pub mod basic;
pub mod connector;
pub mod input;
pub mod meta;
pub mod popup;
pub mod timer;
pub mod ui;
pub mod upload;

/// Behavior rendering a bare element with the given tag.
#[derive(Debug, Clone, Copy)]
pub struct TagRenderer(pub &'static str);

impl Behavior for TagRenderer {
    fn render(&self, cx: &mut Client, _key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        Ok(cx.dom.create(NodeData::new(self.0)))
    }
}

/// Every built-in class, in derivation order.
pub fn classes() -> Vec<Rc<Class>> {
    let base = base_class();
    let ui = ui::ui_class(&base);
    let meta = meta::meta_class(&base);
    let input = input::input_class(&ui);
    let inputbox = input::inputbox_class(&input);
    let numberbox = input::numberbox_class(&inputbox);
    let labeled = basic::labeled_class(&ui);
    vec![
        basic::page_class(&base),
        basic::div_class(&ui),
        basic::span_class(&ui),
        basic::content_class(&ui),
        basic::label_class(&labeled),
        basic::button_class(&labeled),
        basic::hyperlink_class(&labeled),
        input::textbox_class(&inputbox),
        input::integerbox_class(&numberbox),
        input::doublebox_class(&numberbox),
        meta::style_class(&meta),
        meta::script_class(&meta),
        timer::timer_class(&base),
        popup::popup_class(&ui),
        connector::connector_class(&base),
        upload::upload_class(&ui),
        crate::host::host_class(&ui, Rc::new(crate::host::NoHost)),
        base,
        ui,
        meta,
        input,
        inputbox,
        numberbox,
        labeled,
    ]
}

/// The built-in module.
pub fn module() -> Module {
    classes()
        .into_iter()
        .fold(Module::new(BUILTIN_MODULE), Module::with_class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_serves_every_class() {
        let module = module();
        for name in [
            "BaseWidget",
            "UIWidget",
            "MetaWidget",
            "InputWidget",
            "InputboxWidget",
            "NumberboxWidget",
            "LabeledWidget",
            "Page",
            "Div",
            "Span",
            "Content",
            "Label",
            "Button",
            "Hyperlink",
            "Textbox",
            "Integerbox",
            "Doublebox",
            "Style",
            "Script",
            "Timer",
            "Popup",
            "Connector",
            "Upload",
            "HostWidget",
        ] {
            assert!(module.class(name).is_some(), "missing {name}");
        }
        assert_eq!(module.name(), BUILTIN_MODULE);
    }

    #[test]
    fn derivation_chains() {
        let module = module();
        let integerbox = module.class("Integerbox").unwrap();
        assert!(integerbox.is_a("NumberboxWidget"));
        assert!(integerbox.is_a("InputWidget"));
        assert!(integerbox.is_a("UIWidget"));
        assert!(integerbox.is_a("BaseWidget"));
        assert!(module.class("Style").unwrap().is_a("MetaWidget"));
        assert!(!module.class("Page").unwrap().is_a("UIWidget"));
        assert!(!module.class("Timer").unwrap().is_a("UIWidget"));
    }
}
