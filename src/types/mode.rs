use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};

const RULE_14: &str = include_str!("../prompts/rule14.txt");
const SELF_CRITIQUE: &str = include_str!("../prompts/self_critique.txt");
const META_REASONING: &str = include_str!("../prompts/meta_reasoning.txt");

/// The closed set of chat modes.
///
/// Each mode bundles a system prompt with display metadata.  Parsing an
/// identifier into a `Mode` is the only place an unknown mode can be observed;
/// everywhere else the set is matched exhaustively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Strategic analysis and decision support.
    Executive,
    /// Concise, straightforward communication.
    Direct,
    /// Objective synthesis with citations.
    Research,
    /// Brainstorming and ideation.
    Creative,
    /// Blunt accountability and rapid correction.
    BlackFlag,
    /// Empathetic guidance and coaching.
    Support,
}

impl Mode {
    /// Every mode, in display order.
    pub const ALL: [Mode; 6] = [
        Mode::Executive,
        Mode::Direct,
        Mode::Research,
        Mode::Creative,
        Mode::BlackFlag,
        Mode::Support,
    ];

    /// The wire identifier for this mode.
    pub fn id(self) -> &'static str {
        match self {
            Mode::Executive => "executive",
            Mode::Direct => "direct",
            Mode::Research => "research",
            Mode::Creative => "creative",
            Mode::BlackFlag => "blackflag",
            Mode::Support => "support",
        }
    }

    fn index(self) -> usize {
        match self {
            Mode::Executive => 0,
            Mode::Direct => 1,
            Mode::Research => 2,
            Mode::Creative => 3,
            Mode::BlackFlag => 4,
            Mode::Support => 5,
        }
    }

    /// The immutable descriptor for this mode.
    pub fn descriptor(self) -> &'static ModeDescriptor {
        &REGISTRY[self.index()]
    }

    /// Resolve an identifier to its descriptor.
    ///
    /// Identifiers outside the fixed set fail with [`Error::InvalidMode`].
    pub fn lookup(id: &str) -> Result<&'static ModeDescriptor> {
        id.parse::<Mode>().map(Mode::descriptor)
    }

    fn capabilities(self) -> &'static str {
        match self {
            Mode::Executive => {
                "I will provide strategic analysis using multi-frame reasoning: surface summary, structural breakdown, scenario mapping, second-order effects, and strategic recommendations."
            }
            Mode::Direct => {
                "I will deliver concise responses (3-5 sentences) with clear, actionable directives. No qualifiers or unnecessary elaboration."
            }
            Mode::Research => {
                "I will synthesise information from authoritative, technical, practical, and historical sources with citations and triangulated findings."
            }
            Mode::Creative => {
                "I will encourage brainstorming and ideation using trend-pattern projection across past, present, and future patterns."
            }
            Mode::BlackFlag => {
                "I will apply adversarial diagnostics: identifying failure points, attacking weak links, proposing countermeasures, and rebuilding claims stronger."
            }
            Mode::Support => {
                "I will provide empathetic guidance using emotional truth calibration while maintaining accountability and offering concrete next steps."
            }
        }
    }

    fn rule_14_status(self) -> &'static str {
        match self {
            Mode::Support => "Rule 14 is relaxed in this mode, but I will not validate falsehoods.",
            Mode::Creative => {
                "Rule 14 applies when asserting facts; creative ideation is unrestricted."
            }
            Mode::Executive | Mode::Direct | Mode::Research | Mode::BlackFlag => {
                "Rule 14: Present Reality Without Validation is fully active."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.id() == s)
            .ok_or_else(|| Error::invalid_mode(s))
    }
}

/// Display metadata and system prompt for a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDescriptor {
    /// The mode this descriptor belongs to.
    pub mode: Mode,
    /// Human readable name, e.g. "Executive Mode".
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Icon glyph.
    pub icon: &'static str,
    /// CSS color.
    pub color: &'static str,
    /// System prompt injected ahead of every conversation in this mode.
    pub system_prompt: String,
}

impl ModeDescriptor {
    /// The identifier of this descriptor's mode.
    pub fn id(&self) -> &'static str {
        self.mode.id()
    }

    /// Render the start-of-chat message shown when a conversation begins.
    pub fn start_of_chat(&self, date: Date) -> String {
        format!(
            "Welcome to GrowDIS v5.0\n\
             \n\
             START-OF-CHAT PROTOCOL\n\
             ----------------------\n\
             Date: {weekday}, {month} {day}, {year}\n\
             Mode: {icon} {name}\n\
             \n\
             {capabilities}\n\
             \n\
             ACTIVE CONSTRAINTS:\n\
             {rule_14}\n\
             Self-Critique Pass (SCP-1) and Meta-Reasoning Overlay are active.\n\
             \n\
             What would you like to accomplish today?",
            weekday = date.weekday(),
            month = date.month(),
            day = date.day(),
            year = date.year(),
            icon = self.icon,
            name = self.name,
            capabilities = self.mode.capabilities(),
            rule_14 = self.mode.rule_14_status(),
        )
    }
}

/// Today's date in local time, falling back to UTC when the offset is unknown.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// The public view of a mode, without its system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSummary {
    /// Mode identifier.
    pub id: Mode,
    /// Human readable name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Icon glyph.
    pub icon: String,
    /// CSS color.
    pub color: String,
    /// Start-of-chat message, only present for single-mode lookups.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub welcome: Option<String>,
}

impl From<&ModeDescriptor> for ModeSummary {
    fn from(descriptor: &ModeDescriptor) -> Self {
        Self {
            id: descriptor.mode,
            name: descriptor.name.to_string(),
            description: descriptor.description.to_string(),
            icon: descriptor.icon.to_string(),
            color: descriptor.color.to_string(),
            welcome: None,
        }
    }
}

static REGISTRY: LazyLock<[ModeDescriptor; 6]> = LazyLock::new(|| {
    [
        describe(
            Mode::Executive,
            "Executive Mode",
            "Strategic analysis and decision support",
            "📊",
            "#1e3a5f",
            include_str!("../prompts/executive.txt"),
        ),
        describe(
            Mode::Direct,
            "Direct Mode",
            "Concise, straightforward communication",
            "⚡",
            "#059669",
            include_str!("../prompts/direct.txt"),
        ),
        describe(
            Mode::Research,
            "Research Mode",
            "Objective synthesis with citations",
            "🔬",
            "#7c3aed",
            include_str!("../prompts/research.txt"),
        ),
        describe(
            Mode::Creative,
            "Creative Mode",
            "Brainstorming and ideation",
            "🎨",
            "#ea580c",
            include_str!("../prompts/creative.txt"),
        ),
        describe(
            Mode::BlackFlag,
            "Black Flag Mode",
            "Blunt accountability and rapid correction",
            "🏴",
            "#dc2626",
            include_str!("../prompts/blackflag.txt"),
        ),
        describe(
            Mode::Support,
            "Support Mode",
            "Empathetic guidance and coaching",
            "💚",
            "#0891b2",
            include_str!("../prompts/support.txt"),
        ),
    ]
});

fn describe(
    mode: Mode,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    color: &'static str,
    template: &'static str,
) -> ModeDescriptor {
    let system_prompt = template
        .trim_end()
        .replace("{rule14}", RULE_14.trim_end())
        .replace("{self_critique}", SELF_CRITIQUE.trim_end())
        .replace("{meta_reasoning}", META_REASONING.trim_end());
    ModeDescriptor {
        mode,
        name,
        description,
        icon,
        color,
        system_prompt,
    }
}
