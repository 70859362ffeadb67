use crate::config::CoachConfig;
use crate::session::CoachService;
use crate::theme::{BASE_STYLES, font_definition};
use crate::types::FontMode;
use crate::views::{AdminSidebar, ChatView};
use dioxus::prelude::*;
use once_cell::sync::OnceCell;
use std::sync::Arc;

static CONFIG: OnceCell<CoachConfig> = OnceCell::new();

/// Installs the process config and starts the Dioxus app.
pub fn launch(config: CoachConfig) {
    if CONFIG.set(config).is_err() {
        tracing::warn!("config already installed; keeping the first one");
    }
    dioxus::launch(App);
}

fn installed_config() -> CoachConfig {
    CONFIG.get().cloned().unwrap_or_default()
}

#[component]
pub fn App() -> Element {
    let config = use_hook(installed_config);
    let service = use_context_provider(|| Arc::new(CoachService::from_config(&config)));
    let session = use_signal(|| service.new_session(config.origin_address.clone()));
    let font_mode = use_signal(FontMode::default);

    rsx! {
        FontStyles { font_mode }
        div { class: "layout",
            div { class: font_definition(font_mode()).body_class,
                h1 { class: "title", "🧡 社区健康指导员" }
                ChatView { session, font_mode }
            }
            AdminSidebar { session }
        }
    }
}

#[component]
fn FontStyles(font_mode: Signal<FontMode>) -> Element {
    let definition = font_definition(font_mode());
    rsx! {
        style { dangerous_inner_html: "{BASE_STYLES}" }
        style { dangerous_inner_html: "{definition.css}" }
    }
}

#[component]
pub fn FontToggle(font_mode: Signal<FontMode>) -> Element {
    let mut font_mode = font_mode;
    rsx! {
        div { class: "font-toggle", role: "radiogroup",
            span { class: "font-toggle-label", "👀 选择字体大小：" }
            for mode in [FontMode::Standard, FontMode::Elder] {
                button {
                    class: format_args!(
                        "font-option {}",
                        if font_mode() == mode { "active" } else { "" }
                    ),
                    r#type: "button",
                    onclick: move |_| font_mode.set(mode),
                    "{mode.label()}"
                }
            }
        }
    }
}
