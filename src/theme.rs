use crate::types::FontMode;

pub struct FontDefinition {
    pub css: &'static str,
    pub body_class: &'static str,
}

pub fn font_definition(mode: FontMode) -> FontDefinition {
    match mode {
        FontMode::Standard => FontDefinition {
            css: STANDARD_FONT,
            body_class: "page page-standard",
        },
        FontMode::Elder => FontDefinition {
            css: ELDER_FONT,
            body_class: "page page-elder",
        },
    }
}

pub const BASE_STYLES: &str = r#"
:root {
    --color-bg-primary: #fffaf7;
    --color-bg-sidebar: #f6f1ee;
    --color-text-primary: #222222;
    --color-text-muted: #6b6b6b;
    --color-accent: #d9534f;
    --color-button-bg: #f0f2f6;
    --color-chat-user-bg: #fde8e4;
    --color-chat-assistant-bg: #ffffff;
    --color-border: #e3d9d4;
    --color-error: #b52b27;
    --color-success: #2e7d32;
}
* { box-sizing: border-box; }
body { margin: 0; background: var(--color-bg-primary); color: var(--color-text-primary); font-family: "PingFang SC", "Microsoft YaHei", sans-serif; }
.layout { display: flex; min-height: 100vh; }
.page { flex: 1; max-width: 760px; margin: 0 auto; padding: 1.5rem 1rem 8rem; }
.title { color: var(--color-accent); margin: 0 0 1rem; }
.controls { display: flex; gap: 1rem; align-items: flex-end; justify-content: space-between; flex-wrap: wrap; }
.font-toggle { display: flex; gap: 0.5rem; flex-wrap: wrap; }
.font-toggle-label { width: 100%; }
.font-option { border: 1px solid var(--color-border); background: #fff; padding: 0.4em 0.8em; border-radius: 10px; cursor: pointer; }
.font-option.active { border-color: var(--color-accent); background: #fff9f9; font-weight: 600; }
.divider { border: none; border-top: 1px solid var(--color-border); margin: 1rem 0; }
.quick-replies { display: grid; grid-template-rows: repeat(2, auto); grid-auto-flow: column; grid-auto-columns: 1fr; gap: 0.75rem; }
.btn { background: var(--color-button-bg); border: 1px solid var(--color-border); color: var(--color-text-primary); cursor: pointer; }
.btn:disabled { opacity: 0.5; cursor: not-allowed; }
.btn-primary { border-color: var(--color-accent); }
.chat-list { display: flex; flex-direction: column; gap: 0.75rem; }
.greeting { color: var(--color-text-muted); }
.message-row { display: flex; }
.message-row.user { justify-content: flex-end; }
.bubble { max-width: 85%; padding: 0.6em 0.9em; border-radius: 14px; border: 1px solid var(--color-border); }
.bubble.user { background: var(--color-chat-user-bg); white-space: pre-wrap; }
.bubble.assistant { background: var(--color-chat-assistant-bg); }
.notice-error { color: var(--color-error); border: 1px solid var(--color-error); border-radius: 10px; padding: 0.6em 0.9em; }
.composer { position: fixed; left: 0; right: 0; bottom: 0; background: rgba(255, 250, 247, 0.95); border-top: 1px solid var(--color-border); padding: 0.75rem 1rem; }
.composer-inner { display: flex; gap: 0.5rem; max-width: 760px; margin: 0 auto; align-items: flex-end; }
.composer textarea { flex: 1; resize: none; border: 1px solid var(--color-border); border-radius: 10px; padding: 0.5em; font: inherit; }
.sidebar { width: 260px; background: var(--color-bg-sidebar); border-left: 1px solid var(--color-border); padding: 1rem; }
.sidebar-caption { color: var(--color-text-muted); font-size: 0.85em; }
.sidebar input { width: 100%; padding: 0.4em; font: inherit; }
.status-ok { color: var(--color-success); }
.status-error { color: var(--color-error); }
.status-warn { color: #8a6d3b; }
"#;

const STANDARD_FONT: &str = r#"
html, body { font-size: 18px; }
.btn { border-radius: 8px; padding: 0.5em 0.9em; font-size: 1rem; }
"#;

const ELDER_FONT: &str = r#"
html, body { font-size: 26px; font-weight: 500; }
.title { font-size: 40px; }
.btn { height: 3.5em; font-size: 24px; border-radius: 15px; border: 2px solid var(--color-accent); color: #333; }
.font-option { font-size: 22px; background: #fff9f9; padding: 10px; border-radius: 10px; }
.composer textarea { font-size: 24px; }
"#;
