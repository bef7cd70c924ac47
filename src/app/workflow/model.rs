//! Typed workflow configuration.
//!
//! Documents are validated while they are deserialized: every shape error
//! (unknown key, duplicate key, conflicting selectors, missing task payload)
//! rejects the whole document before any lookup can happen.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DEPTH: u32 = 10;
pub const DEFAULT_SCROLL_MARGIN: u32 = 10;
pub const DEFAULT_WAIT_TIME_MS: u64 = 1000;
pub const DEFAULT_SWIPE_STEPS: u32 = 10;

/// Base configuration. All five categories are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WorkflowConfig {
    #[serde(deserialize_with = "unique_map")]
    pub actions: BTreeMap<String, String>,
    #[serde(deserialize_with = "unique_map")]
    pub commands: BTreeMap<String, String>,
    #[serde(deserialize_with = "unique_map")]
    pub packages: BTreeMap<String, String>,
    #[serde(deserialize_with = "unique_map")]
    pub ui_elements: BTreeMap<String, ElementSpec>,
    #[serde(deserialize_with = "unique_map")]
    pub workflows: BTreeMap<String, Vec<Task>>,
}

/// Overlay configuration merged on top of a base; every category is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConfigOverlay {
    #[serde(
        default,
        deserialize_with = "unique_map_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub actions: Option<BTreeMap<String, String>>,
    #[serde(
        default,
        deserialize_with = "unique_map_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub commands: Option<BTreeMap<String, String>>,
    #[serde(
        default,
        deserialize_with = "unique_map_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub packages: Option<BTreeMap<String, String>>,
    #[serde(
        default,
        deserialize_with = "unique_map_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub ui_elements: Option<BTreeMap<String, ElementSpec>>,
    #[serde(
        default,
        deserialize_with = "unique_map_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub workflows: Option<BTreeMap<String, Vec<Task>>>,
}

impl From<WorkflowConfig> for ConfigOverlay {
    fn from(config: WorkflowConfig) -> Self {
        Self {
            actions: Some(config.actions),
            commands: Some(config.commands),
            packages: Some(config.packages),
            ui_elements: Some(config.ui_elements),
            workflows: Some(config.workflows),
        }
    }
}

fn unique_map<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueMapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueMapVisitor<V> {
        type Value = BTreeMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format!("duplicate key '{key}'")));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueMapVisitor(PhantomData))
}

fn unique_map_opt<'de, D, V>(deserializer: D) -> Result<Option<BTreeMap<String, V>>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    unique_map(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// UI elements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    ResourceId,
    Text,
    TextContains,
    Description,
    Class,
    Package,
}

impl SelectorKind {
    pub const ALL: [SelectorKind; 6] = [
        SelectorKind::ResourceId,
        SelectorKind::Text,
        SelectorKind::TextContains,
        SelectorKind::Description,
        SelectorKind::Class,
        SelectorKind::Package,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SelectorKind::ResourceId => "RESOURCE_ID",
            SelectorKind::Text => "TEXT",
            SelectorKind::TextContains => "TEXT_CONTAINS",
            SelectorKind::Description => "DESCRIPTION",
            SelectorKind::Class => "CLASS",
            SelectorKind::Package => "PACKAGE",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Declarative description of how to locate a UI node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawElementSpec", into = "RawElementSpec")]
pub struct ElementSpec {
    pub kind: SelectorKind,
    pub value: String,
    pub clickable: Option<bool>,
    pub scrollable: Option<bool>,
    pub ancestor: Option<Box<ElementSpec>>,
    pub descendant: Option<Box<ElementSpec>>,
    pub max_depth: Option<u32>,
    pub multiple: bool,
}

impl ElementSpec {
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            clickable: None,
            scrollable: None,
            ancestor: None,
            descendant: None,
            max_depth: None,
            multiple: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
struct RawElementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clickable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scrollable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ancestor: Option<Box<ElementSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    descendant: Option<Box<ElementSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    multiple: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TryFrom<RawElementSpec> for ElementSpec {
    type Error = String;

    fn try_from(raw: RawElementSpec) -> Result<Self, Self::Error> {
        let candidates = [
            (SelectorKind::ResourceId, raw.resource_id),
            (SelectorKind::Text, raw.text),
            (SelectorKind::TextContains, raw.text_contains),
            (SelectorKind::Description, raw.description),
            (SelectorKind::Class, raw.class),
            (SelectorKind::Package, raw.package),
        ];

        let mut primary: Option<(SelectorKind, String)> = None;
        for (kind, value) in candidates {
            let Some(value) = value else {
                continue;
            };
            if let Some((existing, _)) = &primary {
                return Err(format!(
                    "UI element sets conflicting selectors {existing} and {kind}"
                ));
            }
            if value.trim().is_empty() {
                return Err(format!("UI element selector {kind} must not be empty"));
            }
            primary = Some((kind, value));
        }

        let Some((kind, value)) = primary else {
            let keys = SelectorKind::ALL
                .iter()
                .map(|kind| kind.key())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!("UI element needs exactly one of {keys}"));
        };

        if let Some(depth) = raw.max_depth {
            if depth == 0 {
                return Err("UI element MAX_DEPTH must be at least 1".to_string());
            }
            if raw.ancestor.is_none() && raw.descendant.is_none() {
                return Err("UI element MAX_DEPTH requires ANCESTOR or DESCENDANT".to_string());
            }
        }

        Ok(ElementSpec {
            kind,
            value,
            clickable: raw.clickable,
            scrollable: raw.scrollable,
            ancestor: raw.ancestor,
            descendant: raw.descendant,
            max_depth: raw.max_depth,
            multiple: raw.multiple,
        })
    }
}

impl From<ElementSpec> for RawElementSpec {
    fn from(spec: ElementSpec) -> Self {
        let mut raw = RawElementSpec {
            clickable: spec.clickable,
            scrollable: spec.scrollable,
            ancestor: spec.ancestor,
            descendant: spec.descendant,
            max_depth: spec.max_depth,
            multiple: spec.multiple,
            ..RawElementSpec::default()
        };
        let slot = match spec.kind {
            SelectorKind::ResourceId => &mut raw.resource_id,
            SelectorKind::Text => &mut raw.text,
            SelectorKind::TextContains => &mut raw.text_contains,
            SelectorKind::Description => &mut raw.description,
            SelectorKind::Class => &mut raw.class,
            SelectorKind::Package => &mut raw.package,
        };
        *slot = Some(spec.value);
        raw
    }
}

// ---------------------------------------------------------------------------
// Scroll / swipe settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrollAction {
    UseGesture,
    UseButton,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrollDirection {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ScrollConfig {
    pub scroll_action: ScrollAction,
    #[serde(default)]
    pub scroll_direction: ScrollDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_forward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_backward: Option<String>,
    #[serde(default = "default_scroll_margin")]
    pub scroll_margin: u32,
    #[serde(default = "default_wait_time")]
    pub scroll_wait_time: u64,
}

impl ScrollConfig {
    fn validate(&self) -> Result<(), String> {
        match self.scroll_action {
            ScrollAction::UseButton => {
                if self.scroll_forward.is_none() {
                    return Err("SCROLL_CONFIG with USE_BUTTON requires SCROLL_FORWARD".to_string());
                }
                if self.scroll_element.is_some() {
                    return Err(
                        "SCROLL_CONFIG with USE_BUTTON does not accept SCROLL_ELEMENT".to_string(),
                    );
                }
            }
            ScrollAction::UseGesture => {
                if self.scroll_forward.is_some() || self.scroll_backward.is_some() {
                    return Err(
                        "SCROLL_CONFIG with USE_GESTURE does not accept scroll buttons".to_string(),
                    );
                }
            }
        }
        Ok(())
    }
}

fn default_scroll_margin() -> u32 {
    DEFAULT_SCROLL_MARGIN
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_TIME_MS
}

fn default_swipe_steps() -> u32 {
    DEFAULT_SWIPE_STEPS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwipeDirection {
    TopToBottom,
    BottomToTop,
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwipeFraction {
    #[default]
    One,
    ThreeQuarter,
    Half,
    Quarter,
}

impl SwipeFraction {
    pub fn ratio(self) -> f64 {
        match self {
            SwipeFraction::One => 1.0,
            SwipeFraction::ThreeQuarter => 0.75,
            SwipeFraction::Half => 0.5,
            SwipeFraction::Quarter => 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SwipeConfig {
    pub swipe_direction: SwipeDirection,
    #[serde(default)]
    pub swipe_fraction: SwipeFraction,
    #[serde(default = "default_swipe_steps")]
    pub number_of_steps: u32,
    #[serde(default = "default_wait_time")]
    pub swipe_wait_time: u64,
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const KEY_CODES: &[(&str, u32)] = &[
    ("HOME", 3),
    ("BACK", 4),
    ("CALL", 5),
    ("ENDCALL", 6),
    ("DPAD_UP", 19),
    ("DPAD_DOWN", 20),
    ("DPAD_LEFT", 21),
    ("DPAD_RIGHT", 22),
    ("DPAD_CENTER", 23),
    ("VOLUME_UP", 24),
    ("VOLUME_DOWN", 25),
    ("POWER", 26),
    ("TAB", 61),
    ("SPACE", 62),
    ("ENTER", 66),
    ("DEL", 67),
    ("MENU", 82),
    ("NOTIFICATION", 83),
    ("SEARCH", 84),
    ("MEDIA_PLAY_PAUSE", 85),
    ("ESCAPE", 111),
    ("APP_SWITCH", 187),
    ("SLEEP", 223),
    ("WAKEUP", 224),
];

/// A key press target, kept with the text it was written as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCode {
    pub name: String,
    pub code: u32,
}

impl KeyCode {
    /// Accepts `HOME`, `KEYCODE_HOME` or a numeric key code.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if let Ok(code) = trimmed.parse::<u32>() {
            return Some(Self {
                name: trimmed.to_string(),
                code,
            });
        }
        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix("KEYCODE_").unwrap_or(upper.as_str());
        KEY_CODES
            .iter()
            .find(|(name, _)| *name == bare)
            .map(|(_, code)| Self {
                name: trimmed.to_string(),
                code: *code,
            })
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Command,
    Press,
    LongPress,
    Click,
    ClickIfExist,
    LongClick,
    HasPackageInForeground,
    HasUiElementInForeground,
    ScrollToFindAndClick,
    ScrollToFindAndClickIfExist,
    Swipe,
    SwipeToFindAndClick,
    SwipeToFindAndClickIfExist,
    WaitMs,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Command => "COMMAND",
            TaskType::Press => "PRESS",
            TaskType::LongPress => "LONG_PRESS",
            TaskType::Click => "CLICK",
            TaskType::ClickIfExist => "CLICK_IF_EXIST",
            TaskType::LongClick => "LONG_CLICK",
            TaskType::HasPackageInForeground => "HAS_PACKAGE_IN_FOREGROUND",
            TaskType::HasUiElementInForeground => "HAS_UI_ELEMENT_IN_FOREGROUND",
            TaskType::ScrollToFindAndClick => "SCROLL_TO_FIND_AND_CLICK",
            TaskType::ScrollToFindAndClickIfExist => "SCROLL_TO_FIND_AND_CLICK_IF_EXIST",
            TaskType::Swipe => "SWIPE",
            TaskType::SwipeToFindAndClick => "SWIPE_TO_FIND_AND_CLICK",
            TaskType::SwipeToFindAndClickIfExist => "SWIPE_TO_FIND_AND_CLICK_IF_EXIST",
            TaskType::WaitMs => "WAIT_MS",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a task does, with exactly the payload its type needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Runs the `COMMANDS` entry with this name.
    Command { command: String },
    Press { key: KeyCode },
    LongPress { key: KeyCode },
    Click { element: String },
    ClickIfExist { element: String },
    LongClick { element: String },
    /// Asserts the `PACKAGES` entry with this name is in the foreground.
    HasPackageInForeground { package: String },
    HasUiElementInForeground { element: String },
    ScrollToFindAndClick {
        element: String,
        scroll: ScrollConfig,
        if_exist: bool,
    },
    Swipe { swipe: SwipeConfig },
    SwipeToFindAndClick {
        element: String,
        swipe: SwipeConfig,
        if_exist: bool,
    },
    WaitMs { duration_ms: u64 },
}

impl TaskAction {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskAction::Command { .. } => TaskType::Command,
            TaskAction::Press { .. } => TaskType::Press,
            TaskAction::LongPress { .. } => TaskType::LongPress,
            TaskAction::Click { .. } => TaskType::Click,
            TaskAction::ClickIfExist { .. } => TaskType::ClickIfExist,
            TaskAction::LongClick { .. } => TaskType::LongClick,
            TaskAction::HasPackageInForeground { .. } => TaskType::HasPackageInForeground,
            TaskAction::HasUiElementInForeground { .. } => TaskType::HasUiElementInForeground,
            TaskAction::ScrollToFindAndClick { if_exist: false, .. } => {
                TaskType::ScrollToFindAndClick
            }
            TaskAction::ScrollToFindAndClick { if_exist: true, .. } => {
                TaskType::ScrollToFindAndClickIfExist
            }
            TaskAction::Swipe { .. } => TaskType::Swipe,
            TaskAction::SwipeToFindAndClick { if_exist: false, .. } => {
                TaskType::SwipeToFindAndClick
            }
            TaskAction::SwipeToFindAndClick { if_exist: true, .. } => {
                TaskType::SwipeToFindAndClickIfExist
            }
            TaskAction::WaitMs { .. } => TaskType::WaitMs,
        }
    }

    /// UI element names this task refers to, including scroll buttons and containers.
    pub fn element_refs(&self) -> Vec<&str> {
        match self {
            TaskAction::Click { element }
            | TaskAction::ClickIfExist { element }
            | TaskAction::LongClick { element }
            | TaskAction::HasUiElementInForeground { element }
            | TaskAction::SwipeToFindAndClick { element, .. } => vec![element.as_str()],
            TaskAction::ScrollToFindAndClick {
                element, scroll, ..
            } => {
                let mut refs = vec![element.as_str()];
                refs.extend(
                    [
                        &scroll.scroll_element,
                        &scroll.scroll_forward,
                        &scroll.scroll_backward,
                    ]
                    .into_iter()
                    .filter_map(|name| name.as_deref()),
                );
                refs
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTask", into = "RawTask")]
pub struct Task {
    pub action: TaskAction,
    pub repeat_count: u32,
}

impl Task {
    pub fn new(action: TaskAction) -> Self {
        Self {
            action,
            repeat_count: 1,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.action.task_type()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
struct TaskPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ui_element: Option<String>,
}

impl TaskPayload {
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.ui_element.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
struct RawTask {
    #[serde(rename = "TYPE")]
    task_type: TaskType,
    #[serde(default, skip_serializing_if = "TaskPayload::is_empty")]
    config: TaskPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scroll_config: Option<ScrollConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    swipe_config: Option<SwipeConfig>,
    #[serde(default = "default_repeat_count", skip_serializing_if = "is_single")]
    repeat_count: u32,
}

fn default_repeat_count() -> u32 {
    1
}

fn is_single(value: &u32) -> bool {
    *value == 1
}

/// Hands out each payload field once; anything left over is rejected.
struct PayloadFields {
    task_type: TaskType,
    text: Option<String>,
    ui_element: Option<String>,
    scroll: Option<ScrollConfig>,
    swipe: Option<SwipeConfig>,
}

impl PayloadFields {
    fn missing(&self, field: &str) -> String {
        format!("{} task requires {field}", self.task_type)
    }

    fn text(&mut self) -> Result<String, String> {
        match self.text.take() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(self.missing("CONFIG.TEXT")),
        }
    }

    fn ui_element(&mut self) -> Result<String, String> {
        match self.ui_element.take() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(self.missing("CONFIG.UI_ELEMENT")),
        }
    }

    fn key(&mut self) -> Result<KeyCode, String> {
        let text = self.text()?;
        KeyCode::parse(&text).ok_or_else(|| format!("{} task has unknown key '{text}'", self.task_type))
    }

    fn duration_ms(&mut self) -> Result<u64, String> {
        let text = self.text()?;
        text.trim().parse::<u64>().map_err(|_| {
            format!(
                "{} task needs a non-negative millisecond count, got '{text}'",
                self.task_type
            )
        })
    }

    fn scroll(&mut self) -> Result<ScrollConfig, String> {
        let scroll = self
            .scroll
            .take()
            .ok_or_else(|| self.missing("SCROLL_CONFIG"))?;
        scroll.validate()?;
        Ok(scroll)
    }

    fn swipe(&mut self) -> Result<SwipeConfig, String> {
        let swipe = self
            .swipe
            .take()
            .ok_or_else(|| self.missing("SWIPE_CONFIG"))?;
        if swipe.number_of_steps == 0 {
            return Err("SWIPE_CONFIG NUMBER_OF_STEPS must be at least 1".to_string());
        }
        Ok(swipe)
    }

    fn finish(self) -> Result<(), String> {
        let leftovers = [
            ("CONFIG.TEXT", self.text.is_some()),
            ("CONFIG.UI_ELEMENT", self.ui_element.is_some()),
            ("SCROLL_CONFIG", self.scroll.is_some()),
            ("SWIPE_CONFIG", self.swipe.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(field, _)| field)
        .collect::<Vec<_>>();
        if leftovers.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "{} task does not accept {}",
                self.task_type,
                leftovers.join(", ")
            ))
        }
    }
}

impl TryFrom<RawTask> for Task {
    type Error = String;

    fn try_from(raw: RawTask) -> Result<Self, Self::Error> {
        if raw.repeat_count == 0 {
            return Err(format!("{} task REPEAT_COUNT must be at least 1", raw.task_type));
        }
        let task_type = raw.task_type;
        let mut fields = PayloadFields {
            task_type,
            text: raw.config.text,
            ui_element: raw.config.ui_element,
            scroll: raw.scroll_config,
            swipe: raw.swipe_config,
        };

        let action = match task_type {
            TaskType::Command => TaskAction::Command {
                command: fields.text()?,
            },
            TaskType::Press => TaskAction::Press { key: fields.key()? },
            TaskType::LongPress => TaskAction::LongPress { key: fields.key()? },
            TaskType::Click => TaskAction::Click {
                element: fields.ui_element()?,
            },
            TaskType::ClickIfExist => TaskAction::ClickIfExist {
                element: fields.ui_element()?,
            },
            TaskType::LongClick => TaskAction::LongClick {
                element: fields.ui_element()?,
            },
            TaskType::HasPackageInForeground => TaskAction::HasPackageInForeground {
                package: fields.text()?,
            },
            TaskType::HasUiElementInForeground => TaskAction::HasUiElementInForeground {
                element: fields.ui_element()?,
            },
            TaskType::ScrollToFindAndClick | TaskType::ScrollToFindAndClickIfExist => {
                TaskAction::ScrollToFindAndClick {
                    element: fields.ui_element()?,
                    scroll: fields.scroll()?,
                    if_exist: task_type == TaskType::ScrollToFindAndClickIfExist,
                }
            }
            TaskType::Swipe => TaskAction::Swipe {
                swipe: fields.swipe()?,
            },
            TaskType::SwipeToFindAndClick | TaskType::SwipeToFindAndClickIfExist => {
                TaskAction::SwipeToFindAndClick {
                    element: fields.ui_element()?,
                    swipe: fields.swipe()?,
                    if_exist: task_type == TaskType::SwipeToFindAndClickIfExist,
                }
            }
            TaskType::WaitMs => TaskAction::WaitMs {
                duration_ms: fields.duration_ms()?,
            },
        };
        fields.finish()?;

        Ok(Task {
            action,
            repeat_count: raw.repeat_count,
        })
    }
}

impl From<Task> for RawTask {
    fn from(task: Task) -> Self {
        let task_type = task.task_type();
        let mut config = TaskPayload::default();
        let mut scroll_config = None;
        let mut swipe_config = None;
        match task.action {
            TaskAction::Command { command } => config.text = Some(command),
            TaskAction::Press { key } | TaskAction::LongPress { key } => {
                config.text = Some(key.name)
            }
            TaskAction::Click { element }
            | TaskAction::ClickIfExist { element }
            | TaskAction::LongClick { element }
            | TaskAction::HasUiElementInForeground { element } => {
                config.ui_element = Some(element)
            }
            TaskAction::HasPackageInForeground { package } => config.text = Some(package),
            TaskAction::ScrollToFindAndClick {
                element, scroll, ..
            } => {
                config.ui_element = Some(element);
                scroll_config = Some(scroll);
            }
            TaskAction::Swipe { swipe } => swipe_config = Some(swipe),
            TaskAction::SwipeToFindAndClick { element, swipe, .. } => {
                config.ui_element = Some(element);
                swipe_config = Some(swipe);
            }
            TaskAction::WaitMs { duration_ms } => config.text = Some(duration_ms.to_string()),
        }
        RawTask {
            task_type,
            config,
            scroll_config,
            swipe_config,
            repeat_count: task.repeat_count,
        }
    }
}
