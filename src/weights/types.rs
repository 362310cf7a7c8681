use serde::{Deserialize, Serialize};

/// Percentage tolerance for all sibling-sum comparisons.
pub const WEIGHT_TOLERANCE: f64 = 0.01;

/// A valid sibling group sums to this.
pub const FULL_WEIGHT: f64 = 100.0;

/// Hard ceiling on how many ancestors an overall-weight walk will visit.
pub const MAX_ANCESTOR_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupItemKind {
    ManualItem,
    Category,
    Page,
    Whiteboard,
    Assignment,
    Quiz,
    Discussion,
}

impl SetupItemKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual_item" => Some(Self::ManualItem),
            "category" => Some(Self::Category),
            "page" => Some(Self::Page),
            "whiteboard" => Some(Self::Whiteboard),
            "assignment" => Some(Self::Assignment),
            "quiz" => Some(Self::Quiz),
            "discussion" => Some(Self::Discussion),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualItem => "manual_item",
            Self::Category => "category",
            Self::Page => "page",
            Self::Whiteboard => "whiteboard",
            Self::Assignment => "assignment",
            Self::Quiz => "quiz",
            Self::Discussion => "discussion",
        }
    }

    pub fn is_category(self) -> bool {
        self == Self::Category
    }
}

/// Flat category row as handed over by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: i64,
    pub parent: Option<i64>,
    pub name: String,
    pub weight: Option<f64>,
    pub extra_credit: bool,
    #[serde(default)]
    pub subcategory_ids: Vec<i64>,
    #[serde(default)]
    pub item_ids: Vec<i64>,
}

/// Flat item row as handed over by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: i64,
    pub category: Option<i64>,
    pub name: String,
    pub weight: Option<f64>,
    pub max_grade: f64,
    pub extra_credit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_module_type: Option<SetupItemKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_module_name: Option<String>,
}

/// One node of the gradebook setup tree. Only `Category` nodes carry children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SetupItemKind,
    pub name: String,
    pub weight: Option<f64>,
    pub max_grade: Option<f64>,
    #[serde(default)]
    pub extra_credit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_items: Option<Vec<SetupItem>>,
}

impl SetupItem {
    pub fn leaf(id: i64, name: impl Into<String>, weight: Option<f64>, max_grade: f64) -> Self {
        Self {
            id,
            kind: SetupItemKind::ManualItem,
            name: name.into(),
            weight,
            max_grade: Some(max_grade),
            extra_credit: false,
            grade_items: None,
        }
    }

    pub fn category(
        id: i64,
        name: impl Into<String>,
        weight: Option<f64>,
        grade_items: Vec<SetupItem>,
    ) -> Self {
        Self {
            id,
            kind: SetupItemKind::Category,
            name: name.into(),
            weight,
            max_grade: None,
            extra_credit: false,
            grade_items: Some(grade_items),
        }
    }

    pub fn with_extra_credit(mut self) -> Self {
        self.extra_credit = true;
        self
    }

    pub fn is_category(&self) -> bool {
        self.kind.is_category()
    }

    pub fn children(&self) -> &[SetupItem] {
        self.grade_items.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupItemWithCalculations {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SetupItemKind,
    pub name: String,
    pub weight: Option<f64>,
    pub max_grade: Option<f64>,
    pub extra_credit: bool,
    pub adjusted_weight: Option<f64>,
    pub auto_weighted_zero: bool,
    pub overall_weight: Option<f64>,
    pub weight_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_items: Option<Vec<SetupItemWithCalculations>>,
}

impl SetupItemWithCalculations {
    pub fn is_category(&self) -> bool {
        self.kind.is_category()
    }

    pub fn children(&self) -> &[SetupItemWithCalculations] {
        self.grade_items.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraCreditEntry {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SetupItemKind,
    pub name: String,
    pub weight: Option<f64>,
    pub overall_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub base_total: f64,
    pub extra_credit_total: f64,
    pub calculated_total: f64,
    pub extra_credit_items: Vec<ExtraCreditEntry>,
    pub extra_credit_categories: Vec<ExtraCreditEntry>,
    pub total_max_grade: f64,
}

/// Export shape: the bare tree, no calculated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradebookSetup {
    pub items: Vec<SetupItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradebookSetupForUi {
    pub items: Vec<SetupItemWithCalculations>,
}

/// Renders a percentage with at most two decimals and no trailing zeros: `50`, `33.33`, `0.25`.
pub fn format_percent(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
