//! Simple widgets: the page, plain elements, labels, buttons and links.

use std::rc::Rc;

use serde_json::{json, Map};

use super::TagRenderer;
use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::{Error, Result};
use crate::util;
use crate::widget::{Behavior, Class, Super, WidgetKey};

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

struct PageBehavior;

impl Behavior for PageBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        if cx.node(key)?.parent().is_some() {
            return Err(Error::PageHasParent);
        }
        let mut state = Map::new();
        state.insert("closable".into(), json!(true));
        cx.init_state(key, state, false)?;
        cx.set_page(Some(key));
        Ok(())
    }

    fn render(&self, cx: &mut Client, _key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        let root = cx.dom.app_root();
        Ok(cx.dom.insert_child(root, NodeData::new("div")))
    }
}

/// The top-level widget. At most one exists; its handle lives directly under
/// the application root.
pub fn page_class(base: &Rc<Class>) -> Rc<Class> {
    base.extend("Page")
        .behavior(PageBehavior)
        .setter("closable", |cx, _, v, _| {
            cx.set_can_close(util::truthy(v));
            Ok(())
        })
        .setter("title", |cx, _, v, _| {
            cx.set_title(&util::as_text(v).unwrap_or_default());
            Ok(())
        })
        .build()
}

impl Client {
    /// Set the document title.
    pub fn set_title(&mut self, title: &str) {
        let head = self.dom.head();
        let existing = self
            .dom
            .children(head)
            .iter()
            .copied()
            .find(|n| self.dom.get(*n).is_some_and(|d| d.tag == "title"));
        match existing {
            Some(node) => self.dom.set_text(node, title),
            None => {
                self.dom.insert_child(head, NodeData::new("title").with_text(title));
            }
        }
    }

    /// The document title, if set.
    pub fn title(&self) -> Option<String> {
        let head = self.dom.head();
        self.dom
            .children(head)
            .iter()
            .find(|n| self.dom.get(**n).is_some_and(|d| d.tag == "title"))
            .map(|n| self.dom.text_content(*n))
    }
}

// ---------------------------------------------------------------------------
// Plain elements
// ---------------------------------------------------------------------------

pub fn div_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("Div").behavior(TagRenderer("div")).build()
}

pub fn span_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("Span").behavior(TagRenderer("span")).build()
}

/// A span whose text is its `content` state.
pub fn content_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("Content")
        .behavior(TagRenderer("span"))
        .setter("content", |cx, key, v, _| {
            if let Some(handle) = cx.handle(key) {
                cx.dom.set_text(handle, util::as_text(v).unwrap_or_default());
            }
            Ok(())
        })
        .build()
}

// ---------------------------------------------------------------------------
// Labeled widgets
// ---------------------------------------------------------------------------

/// Widgets with a text label: shown in the `lbl` sub-component when the
/// rendering provides one, else as the handle's text.
pub fn labeled_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("LabeledWidget")
        .setter("label", |cx, key, v, _| {
            let text = util::as_text(v).unwrap_or_default();
            if let Some(node) = cx.sub(key, "lbl").or_else(|| cx.handle(key)) {
                cx.dom.set_text(node, text);
            }
            Ok(())
        })
        .setter("position", |cx, key, v, old| {
            if let Some(old) = old.and_then(util::as_text) {
                let class = cx.subclazz(key, &format!("label-{old}"));
                cx.toggle_class(key, &class, Some(false))?;
            }
            if let Some(position) = util::as_text(v).filter(|p| !p.is_empty()) {
                let class = cx.subclazz(key, &format!("label-{position}"));
                cx.toggle_class(key, &class, Some(true))?;
            }
            Ok(())
        })
        .build()
}

pub fn label_class(labeled: &Rc<Class>) -> Rc<Class> {
    labeled
        .extend("Label")
        .behavior(LabelBehavior)
        .build()
}

struct LabelBehavior;

impl Behavior for LabelBehavior {
    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        cx.element(key, r#"<label class="label-default"/>"#)
    }
}

struct ButtonBehavior;

impl Behavior for ButtonBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        cx.toggle_class(key, "btn", Some(true))?;
        Ok(())
    }

    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        let button = cx.element(key, "<button/>")?;
        cx.append_templates(key, button, &[":image", "label"])?;
        Ok(button)
    }
}

pub fn button_class(labeled: &Rc<Class>) -> Rc<Class> {
    labeled
        .extend("Button")
        .behavior(ButtonBehavior)
        .setter("image", |cx, key, _, _| cx.rerender(key))
        .build()
}

struct HyperlinkBehavior;

impl Behavior for HyperlinkBehavior {
    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        let link = cx.element(key, "<a/>")?;
        cx.append_templates(key, link, &[":image", "label"])?;
        Ok(link)
    }
}

pub fn hyperlink_class(labeled: &Rc<Class>) -> Rc<Class> {
    labeled
        .extend("Hyperlink")
        .behavior(HyperlinkBehavior)
        .setter("href", |cx, key, v, _| {
            cx.set_handle_attr(key, "href", v);
            Ok(())
        })
        .setter("image", |cx, key, _, _| cx.rerender(key))
        .setter("target", |cx, key, v, _| {
            cx.set_handle_attr(key, "target", v);
            Ok(())
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Pilot;
    use crate::widget::Props;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn button_renders_label_and_image() {
        let mut pilot = Pilot::new();
        let key = pilot.create("Button", "btn1", json!({"label": "Go"})).await;
        assert_eq!(
            pilot.html_of("btn1"),
            r#"<button id="btn1" class="sw_button btn"><span id="btn1-lbl">Go</span></button>"#
        );
        pilot
            .send(json!({"tgt": "btn1", "fcn": "updateState", "arg": ["image", "go.png", true]}))
            .await;
        let img = pilot.node("btn1-img");
        let cx = pilot.client();
        assert_eq!(cx.dom().get(img).unwrap().attr("src").as_deref(), Some("go.png"));
        assert_eq!(cx.dom().children(cx.handle(key).unwrap()).len(), 2);
        assert_eq!(pilot.text("btn1"), "Go");
    }

    #[tokio::test]
    async fn label_without_sub_component() {
        let mut pilot = Pilot::new();
        pilot.create("Label", "l1", json!({"label": "Name", "position": "left"})).await;
        assert_eq!(pilot.text("l1"), "Name");
        let data = pilot.client().dom().get(pilot.node("l1")).unwrap();
        assert!(data.has_class("label-default"));
        assert!(data.has_class("sw_label-label-left"));
        pilot.send(json!({"tgt": "l1", "fcn": "updateState", "arg": ["position", "right", true]})).await;
        let data = pilot.client().dom().get(pilot.node("l1")).unwrap();
        assert!(!data.has_class("sw_label-label-left"));
        assert!(data.has_class("sw_label-label-right"));
    }

    #[tokio::test]
    async fn hyperlink_attributes() {
        let mut pilot = Pilot::new();
        pilot
            .create("Hyperlink", "a1", json!({"href": "/docs", "target": "_blank", "label": "Docs"}))
            .await;
        let data = pilot.client().dom().get(pilot.node("a1")).unwrap();
        assert_eq!(data.tag, "a");
        assert_eq!(data.attr("href").as_deref(), Some("/docs"));
        assert_eq!(data.attr("target").as_deref(), Some("_blank"));
        assert_eq!(pilot.text("a1-lbl"), "Docs");
    }

    #[tokio::test]
    async fn content_widget_text() {
        let mut pilot = Pilot::new();
        pilot.create("Content", "c1", json!({"content": "<b>raw</b>"})).await;
        assert_eq!(pilot.text("c1"), "<b>raw</b>");
        assert!(pilot.html_of("c1").contains("&lt;b&gt;raw&lt;/b&gt;"));
    }

    #[tokio::test]
    async fn page_is_top_level() {
        let mut pilot = Pilot::new();
        let page = pilot
            .create_with(Props::new("Page").with_id("p1").container(), None, json!({"title": "Home"}))
            .await;
        let cx = pilot.client_mut();
        assert_eq!(cx.page(), Some(page));
        assert_eq!(cx.title().as_deref(), Some("Home"));
        assert!(cx.can_close());
        let root = cx.dom().app_root();
        assert_eq!(cx.dom().parent(cx.handle(page).unwrap()), Some(root));
        cx.update_state(page, "closable", json!(false), true).unwrap();
        assert!(!cx.can_close());
        let err = cx
            .create(Some(page), Props::new("Page").with_id("p2"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PageHasParent));
        assert!(cx.find("p2").is_none());
        cx.destroy(page).unwrap();
        assert!(cx.page().is_none());
    }
}
