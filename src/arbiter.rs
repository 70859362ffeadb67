//! Picks the next user utterance out of one interaction cycle.
//!
//! A cycle can carry a pressed quick-reply button, typed text, both or
//! neither. The button wins when both are present.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuickReply {
    KneePain,
    HighBloodPressure,
    WeightLoss,
    FourWeekPlan,
}

impl QuickReply {
    /// Display order: left column top to bottom, then right column.
    pub const ALL: [QuickReply; 4] = [
        QuickReply::KneePain,
        QuickReply::HighBloodPressure,
        QuickReply::WeightLoss,
        QuickReply::FourWeekPlan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuickReply::KneePain => "🦵 膝盖疼",
            QuickReply::HighBloodPressure => "💓 高血压",
            QuickReply::WeightLoss => "📉 我想减肥",
            QuickReply::FourWeekPlan => "📅 制定计划",
        }
    }

    pub fn utterance(self) -> &'static str {
        match self {
            QuickReply::KneePain => "我的膝盖有点疼，平时上下楼梯不舒服，该怎么运动？",
            QuickReply::HighBloodPressure => "我有高血压，运动的时候要注意什么？",
            QuickReply::WeightLoss => "我最近胖了，想减肥，但我不想去健身房。",
            QuickReply::FourWeekPlan => "请给我制定一个适合我的四周运动计划。",
        }
    }
}

/// Everything the user did during one render pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputCycle {
    pub quick_reply: Option<QuickReply>,
    pub free_text: Option<String>,
}

/// Where the chosen utterance came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Utterance {
    QuickReply(QuickReply),
    FreeText(String),
}

impl Utterance {
    pub fn text(&self) -> &str {
        match self {
            Utterance::QuickReply(trigger) => trigger.utterance(),
            Utterance::FreeText(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Utterance::QuickReply(trigger) => trigger.utterance().to_string(),
            Utterance::FreeText(text) => text,
        }
    }
}

impl InputCycle {
    pub fn quick_reply(trigger: QuickReply) -> Self {
        Self {
            quick_reply: Some(trigger),
            free_text: None,
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            quick_reply: None,
            free_text: Some(text.into()),
        }
    }

    /// Resolves the cycle into at most one utterance. Blank text counts as no
    /// input; typed text is trimmed.
    pub fn resolve(self) -> Option<Utterance> {
        if let Some(trigger) = self.quick_reply {
            return Some(Utterance::QuickReply(trigger));
        }
        let text = self.free_text?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Utterance::FreeText(trimmed.to_string()))
        }
    }
}
