use crate::arbiter::{InputCycle, QuickReply};
use crate::session::{
    ChatSession, CoachService, EventOutcome, GREETING, SessionEvent, TurnProgress,
};
use crate::types::{FontMode, Role};
use crate::ui::FontToggle;
use crate::views::shared::markdown_to_html;
use dioxus::events::Key;
use dioxus::prelude::*;
use std::sync::Arc;

/// The turn in flight, shown on top of the committed transcript.
#[derive(Clone, Debug, Default, PartialEq)]
struct PendingTurn {
    user: String,
    partial: String,
}

/// Signals the chat view hands to its event handlers.
#[derive(Clone, Copy, PartialEq)]
struct ChatController {
    service: Signal<Arc<CoachService>>,
    session: Signal<ChatSession>,
    pending: Signal<Option<PendingTurn>>,
    notice: Signal<Option<&'static str>>,
    busy: Signal<bool>,
}

impl ChatController {
    fn submit(self, cycle: InputCycle) {
        if let Some(event) = SessionEvent::from_cycle(cycle) {
            self.send(event);
        }
    }

    fn send(self, event: SessionEvent) {
        let ChatController {
            service,
            mut session,
            mut pending,
            mut notice,
            mut busy,
        } = self;
        if busy() {
            return;
        }
        busy.set(true);
        notice.set(None);

        spawn(async move {
            let service = service();
            let mut working = session();
            let outcome = service
                .dispatch(&mut working, event, |progress| match progress {
                    TurnProgress::UserAccepted(user) => pending.set(Some(PendingTurn {
                        user: user.to_string(),
                        partial: String::new(),
                    })),
                    TurnProgress::Partial(partial) => pending.with_mut(|slot| {
                        if let Some(turn) = slot.as_mut() {
                            turn.partial = partial.to_string();
                        }
                    }),
                })
                .await;

            session.set(working);
            pending.set(None);
            if let EventOutcome::ReplyFailed { notice: text } = outcome {
                notice.set(Some(text));
            }
            busy.set(false);
        });
    }
}

#[component]
pub fn ChatView(session: Signal<ChatSession>, font_mode: Signal<FontMode>) -> Element {
    let service = use_context::<Arc<CoachService>>();
    let service = use_signal(move || service);
    let pending = use_signal(|| Option::<PendingTurn>::None);
    let notice = use_signal(|| Option::<&'static str>::None);
    let busy = use_signal(|| false);
    let mut input = use_signal(String::new);

    let controller = ChatController {
        service,
        session,
        pending,
        notice,
        busy,
    };

    let mut submit_text = move || {
        let text = input();
        if busy() || text.trim().is_empty() {
            return;
        }
        input.set(String::new());
        controller.submit(InputCycle::free_text(text));
    };

    let snapshot = session();
    let visible = snapshot.transcript().visible().cloned().collect::<Vec<_>>();
    let in_flight = pending();
    let error_notice = notice();
    let sending = busy();

    rsx! {
        div { class: "controls",
            FontToggle { font_mode }
            button {
                class: "btn",
                r#type: "button",
                disabled: sending,
                onclick: move |_| controller.send(SessionEvent::Reset),
                "🔄 重新开始"
            }
        }
        hr { class: "divider" }
        h5 { "👇哪怕不会打字，点下面也能问：" }
        div { class: "quick-replies",
            for trigger in QuickReply::ALL {
                button {
                    key: "{trigger.label()}",
                    class: "btn",
                    r#type: "button",
                    disabled: sending,
                    onclick: move |_| controller.submit(InputCycle::quick_reply(trigger)),
                    "{trigger.label()}"
                }
            }
        }
        hr { class: "divider" }

        div { id: "chat-list", class: "chat-list",
            if visible.is_empty() && in_flight.is_none() {
                div { class: "message-row assistant",
                    div { class: "bubble assistant greeting", "{GREETING}" }
                }
            }
            for (i, msg) in visible.iter().enumerate() {
                if msg.role == Role::Assistant {
                    div { key: "{i}", class: "message-row assistant",
                        AssistantBubble { content: msg.content.clone() }
                    }
                } else {
                    div { key: "{i}", class: "message-row user",
                        div { class: "bubble user", "{msg.content}" }
                    }
                }
            }
            if let Some(turn) = in_flight {
                div { class: "message-row user",
                    div { class: "bubble user", "{turn.user}" }
                }
                if !turn.partial.is_empty() {
                    div { class: "message-row assistant",
                        AssistantBubble { content: turn.partial.clone() }
                    }
                }
            }
            if let Some(text) = error_notice {
                div { class: "notice-error", role: "alert", "{text}" }
            }
        }

        form { class: "composer",
            onsubmit: move |ev| ev.prevent_default(),
            div { class: "composer-inner",
                textarea {
                    rows: "1",
                    placeholder: "也可以在这里打字...",
                    value: "{input}",
                    oninput: move |ev| input.set(ev.value()),
                    onkeydown: move |ev| {
                        if ev.key() == Key::Enter && !ev.modifiers().shift() {
                            ev.prevent_default();
                            submit_text();
                        }
                    },
                    disabled: sending,
                }
                button {
                    class: "btn btn-primary",
                    r#type: "button",
                    disabled: sending || input().trim().is_empty(),
                    onclick: move |_| submit_text(),
                    "发送"
                }
            }
        }
    }
}

#[component]
fn AssistantBubble(content: String) -> Element {
    let content_html = markdown_to_html(&content);
    rsx! {
        div { class: "bubble assistant",
            div { class: "md", dangerous_inner_html: "{content_html}" }
        }
    }
}
