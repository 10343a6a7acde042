//! Label → code tables for the listing API's category filters.
//!
//! Unknown labels resolve to `None`; the caller omits the parameter.

/// Life-stage codes (`lifeArray`).
const LIFE_STAGES: &[(&str, &str)] = &[
    ("영유아", "001"),
    ("아동", "002"),
    ("청소년", "003"),
    ("청년", "004"),
    ("중장년", "005"),
    ("노년", "006"),
    ("임신출산", "007"),
    ("임신 · 출산", "007"),
];

/// Target-group codes (`trgterIndvdlArray`).
const TARGET_GROUPS: &[(&str, &str)] = &[
    ("다문화", "010"),
    ("탈북민", "010"),
    ("다자녀", "020"),
    ("보훈", "030"),
    ("장애인", "040"),
    ("저소득", "050"),
    ("한부모", "060"),
    ("조손", "060"),
];

/// Interest-theme codes (`intrsThemaArray`).
const THEMES: &[(&str, &str)] = &[
    ("신체건강", "010"),
    ("정신건강", "020"),
    ("생활지원", "030"),
    ("주거", "040"),
    ("일자리", "050"),
    ("문화", "060"),
    ("여가", "060"),
    ("안전", "070"),
    ("위기", "070"),
    ("임신", "080"),
    ("출산", "080"),
    ("보육", "090"),
    ("교육", "100"),
    ("입양", "110"),
    ("위탁", "110"),
    ("보호", "120"),
    ("돌봄", "120"),
    ("서민금융", "130"),
    ("법률", "140"),
];

fn lookup(table: &[(&str, &'static str)], label: &str) -> Option<&'static str> {
    let label = label.trim();
    table.iter().find(|(l, _)| *l == label).map(|(_, code)| *code)
}

pub fn life_stage_code(label: &str) -> Option<&'static str> {
    lookup(LIFE_STAGES, label)
}

pub fn target_group_code(label: &str) -> Option<&'static str> {
    lookup(TARGET_GROUPS, label)
}

pub fn theme_code(label: &str) -> Option<&'static str> {
    lookup(THEMES, label)
}

/// Result ordering (`arrgOrd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Feed default ordering.
    Standard,
    /// Most-viewed first.
    Popular,
}

impl SortOrder {
    pub fn code(self) -> &'static str {
        match self {
            Self::Standard => "001",
            Self::Popular => "002",
        }
    }
}
