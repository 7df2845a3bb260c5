//! The tag taxonomy: a fixed, versioned table mapping keyword rules to
//! structured labels.
//!
//! The table is ordinary data, serde-loadable and validated once at
//! startup, so the matching behavior of every category is an explicit,
//! declared property instead of an accident of code order. Each category
//! carries:
//!
//! * a `prefix` that namespaces its labels (`menh_*`, `chu_de_*`, ...),
//! * a [`MatchMode`]: whether the first matching rule wins or every
//!   matching rule contributes a label,
//! * a [`LabelSource`]: whether labels are formed from the rule key or
//!   from the literal keyword that matched.

pub mod classifier;

use serde::{Deserialize, Serialize};

pub use classifier::{TagClassifier, normalize_for_match};

use crate::types::PipelineError;

/// How a category resolves multiple matching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The first rule (in declaration order) with a matching keyword wins;
    /// the category contributes at most one label.
    FirstWins,
    /// Every matching rule contributes a label; the category is not
    /// mutually exclusive (colors, moods, materials).
    MultiLabel,
}

/// How a category forms its label suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// `"{prefix}_{rule.key}"`.
    RuleKey,
    /// `"{prefix}_{matched keyword}"` with the keyword normalized and
    /// whitespace replaced by underscores.
    Keyword,
}

/// An ordered keyword rule within a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRule {
    pub key: String,
    pub keywords: Vec<String>,
}

impl TagRule {
    pub fn new(key: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            key: key.into(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

/// A category group: ordered rules plus declared matching semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub prefix: String,
    pub mode: MatchMode,
    pub label_from: LabelSource,
    pub rules: Vec<TagRule>,
}

/// The process-wide taxonomy table. Categories are iterated in declaration
/// order, which fixes label priority for first-match-wins categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    /// Builds a taxonomy, rejecting malformed tables up front.
    pub fn new(categories: Vec<Category>) -> Result<Self, PipelineError> {
        let taxonomy = Self { categories };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Missing or degenerate tables are configuration errors, fatal at
    /// startup rather than per-call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.categories.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "taxonomy has no categories".into(),
            ));
        }
        let mut prefixes = std::collections::BTreeSet::new();
        for category in &self.categories {
            if category.prefix.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "taxonomy category with empty prefix".into(),
                ));
            }
            if !prefixes.insert(category.prefix.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate taxonomy prefix '{}'",
                    category.prefix
                )));
            }
            if category.rules.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "taxonomy category '{}' has no rules",
                    category.prefix
                )));
            }
            let mut keys = std::collections::BTreeSet::new();
            for rule in &category.rules {
                if !keys.insert(rule.key.as_str()) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "duplicate rule key '{}' in category '{}'",
                        rule.key, category.prefix
                    )));
                }
                if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "rule '{}' in category '{}' has no usable keywords",
                        rule.key, category.prefix
                    )));
                }
            }
        }
        Ok(())
    }

    /// The built-in table for the Vietnamese decor catalog.
    ///
    /// Category order is the fixed priority order: ngũ hành element first,
    /// then semantic intent, topic, style and space (all first-match-wins),
    /// followed by the non-exclusive color, mood and material groups.
    pub fn vietnamese_decor() -> Self {
        let categories = vec![
            Category {
                prefix: "menh".into(),
                mode: MatchMode::FirstWins,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new(
                        "thuy",
                        // Keywords stay at two words or a distinctive single
                        // word: matching is substring-based after diacritic
                        // stripping, so a bare "hồ" would hide inside "phong".
                        &["nước", "sông", "biển", "hồ nước", "thác", "suối", "thuyền"],
                    ),
                    TagRule::new(
                        "moc",
                        &["cây", "rừng", "cây tre", "trúc", "đồng cỏ", "vườn", "lá cây"],
                    ),
                    TagRule::new(
                        "hoa",
                        &["mặt trời", "hoàng hôn", "bình minh", "ngọn lửa", "phượng hoàng"],
                    ),
                    TagRule::new("tho", &["núi", "đồi", "ruộng bậc thang", "đất đai", "sa mạc"]),
                    TagRule::new("kim", &["kim loại", "ánh kim", "dát vàng", "dát bạc"]),
                ],
            },
            Category {
                prefix: "y_nghia".into(),
                mode: MatchMode::FirstWins,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new("tai_loc", &["tài lộc", "phú quý", "thịnh vượng", "tiền tài"]),
                    TagRule::new("binh_an", &["bình an", "an khang", "sức khỏe"]),
                    TagRule::new("tinh_duyen", &["tình duyên", "hạnh phúc", "uyên ương"]),
                    TagRule::new(
                        "su_nghiep",
                        &["sự nghiệp", "thăng tiến", "mã đáo thành công"],
                    ),
                ],
            },
            Category {
                prefix: "chu_de".into(),
                mode: MatchMode::FirstWins,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new(
                        "phong_canh",
                        &["phong cảnh", "vùng cao", "làng quê", "thiên nhiên"],
                    ),
                    TagRule::new("hoa_la", &["hoa sen", "hoa mai", "hoa đào", "bó hoa"]),
                    TagRule::new(
                        "dong_vat",
                        &["cá chép", "chim công", "đàn cá", "ngựa", "con hổ"],
                    ),
                    TagRule::new("truu_tuong", &["trừu tượng", "hình khối", "đương đại"]),
                    TagRule::new("tinh_vat", &["tĩnh vật", "bình gốm", "bình trà"]),
                ],
            },
            Category {
                prefix: "phong_cach".into(),
                mode: MatchMode::FirstWins,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new("hien_dai", &["hiện đại", "tân thời"]),
                    TagRule::new("co_dien", &["cổ điển", "hoài cổ", "vintage"]),
                    TagRule::new("toi_gian", &["tối giản", "đơn giản", "minimalist"]),
                    TagRule::new("dong_que", &["đồng quê", "mộc mạc"]),
                ],
            },
            Category {
                prefix: "khong_gian".into(),
                mode: MatchMode::FirstWins,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new("phong_khach", &["phòng khách", "sofa"]),
                    TagRule::new("phong_ngu", &["phòng ngủ", "đầu giường"]),
                    TagRule::new("phong_an", &["phòng ăn", "bàn ăn"]),
                    TagRule::new("van_phong", &["văn phòng", "bàn làm việc"]),
                ],
            },
            Category {
                prefix: "mau".into(),
                mode: MatchMode::MultiLabel,
                label_from: LabelSource::RuleKey,
                // One rule per color. Stripped single syllables that double
                // as common words ("hồng" in "phòng", "trắng" in "trang
                // trí", "cam" vs "cảm") only appear in multi-word forms.
                rules: vec![
                    TagRule::new("xanh", &["xanh"]),
                    TagRule::new("do", &["màu đỏ", "đỏ rực"]),
                    TagRule::new("vang", &["vàng"]),
                    TagRule::new("trang", &["màu trắng", "trắng tinh"]),
                    TagRule::new("den", &["màu đen"]),
                    TagRule::new("hong", &["màu hồng", "hồng phấn"]),
                    TagRule::new("nau", &["nâu"]),
                    TagRule::new("tim", &["màu tím", "tím than"]),
                    TagRule::new("cam", &["màu cam"]),
                ],
            },
            Category {
                prefix: "cam_xuc".into(),
                mode: MatchMode::MultiLabel,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new("thu_gian", &["thư giãn", "yên bình", "êm dịu"]),
                    TagRule::new("am_ap", &["ấm áp", "ấm cúng"]),
                    TagRule::new("sang_trong", &["sang trọng", "quý phái"]),
                    TagRule::new("tuoi_sang", &["tươi sáng", "rực rỡ"]),
                ],
            },
            Category {
                prefix: "chat_lieu".into(),
                mode: MatchMode::MultiLabel,
                label_from: LabelSource::RuleKey,
                rules: vec![
                    TagRule::new("son_dau", &["sơn dầu"]),
                    TagRule::new("canvas", &["canvas", "vải bố"]),
                    TagRule::new("lua", &["tranh lụa", "vẽ trên lụa"]),
                    TagRule::new("giay", &["giấy dó", "giấy"]),
                ],
            },
        ];

        Self::new(categories).expect("built-in taxonomy is valid")
    }
}
