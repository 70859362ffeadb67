use crate::admin::{AdminPanel, LogExport, NO_LOG_NOTICE, REJECTED_NOTICE, VERIFIED_NOTICE};
use crate::session::{ChatSession, CoachService, EventOutcome, SessionEvent};
use dioxus::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

fn export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[component]
pub fn AdminSidebar(session: Signal<ChatSession>) -> Element {
    let service = use_context::<Arc<CoachService>>();
    let mut password = use_signal(String::new);
    let mut panel = use_signal(|| AdminPanel::Idle);

    // re-checked on every keystroke and after every finished turn, so the
    // row count tracks the log
    use_effect(move || {
        let input = password();
        let mut working = session();
        let service = Arc::clone(&service);
        spawn(async move {
            let outcome = service
                .dispatch(&mut working, SessionEvent::AdminAuth(input), |_| {})
                .await;
            if let EventOutcome::Admin(next) = outcome {
                panel.set(next);
            }
        });
    });

    rsx! {
        aside { class: "sidebar",
            h3 { "🔒 管理员后台" }
            input {
                r#type: "password",
                placeholder: "请输入密码",
                value: "{password}",
                oninput: move |ev| password.set(ev.value()),
            }
            {match panel() {
                AdminPanel::Idle => rsx! {},
                AdminPanel::Rejected => rsx! {
                    p { class: "status-error", "{REJECTED_NOTICE}" }
                },
                AdminPanel::Granted { export } => rsx! {
                    p { class: "status-ok", "{VERIFIED_NOTICE}" }
                    if let Some(export) = export {
                        ExportControls { export }
                    } else {
                        p { class: "status-warn", "{NO_LOG_NOTICE}" }
                    }
                },
            }}
        }
    }
}

#[component]
fn ExportControls(export: LogExport) -> Element {
    let mut saved = use_signal(|| Option::<Result<PathBuf, String>>::None);
    let payload = export.clone();

    rsx! {
        button {
            class: "btn btn-primary",
            r#type: "button",
            onclick: move |_| {
                let result = payload.save_to(&export_dir()).map_err(|err| err.to_string());
                match &result {
                    Ok(path) => tracing::info!(path = %path.display(), "turn log exported"),
                    Err(err) => tracing::warn!(error = %err, "turn log export failed"),
                }
                saved.set(Some(result));
            },
            "📥 点击下载所有数据 (CSV)"
        }
        p { class: "sidebar-caption", "{export.row_count_label()}" }
        {match saved() {
            Some(Ok(path)) => rsx! {
                p { class: "sidebar-caption", "已保存：{path.display()}" }
            },
            Some(Err(err)) => rsx! {
                p { class: "status-error", "保存失败：{err}" }
            },
            None => rsx! {},
        }}
    }
}
