use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};

const WEIGHT_TOLERANCE: f64 = 1e-9;
pub const TOTAL_CATEGORY_WEIGHT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiDefinition {
    pub category: String,
    pub name: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Threshold used when a status is derived from an actual measurement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub name: String,
    pub weight: f64,
    pub kpis: Vec<KpiDefinition>,
}

/// Static, validated KPI taxonomy. Category order is preserved for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiCatalog {
    categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    categories: Vec<CategoryFileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryFileEntry {
    name: String,
    weight: f64,
    kpis: Vec<KpiFileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KpiFileEntry {
    name: String,
    weight: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    measurement: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    target_value: Option<f64>,
}

struct StandardKpi {
    name: &'static str,
    weight: f64,
    description: &'static str,
    measurement: &'static str,
    target: &'static str,
    target_value: f64,
}

const STANDARD_CATEGORIES: [(&str, f64, [StandardKpi; 4]); 5] = [
    (
        "Performance & Delivery",
        35.0,
        [
            StandardKpi {
                name: "Task Completion Rate",
                weight: 8.75,
                description: "Percentage of assigned tasks completed within agreed timelines",
                measurement: "(# completed on time / total assigned) x 100",
                target: ">= 90%",
                target_value: 90.0,
            },
            StandardKpi {
                name: "Quality of Output",
                weight: 8.75,
                description: "Accuracy, attention to detail, and adherence to standards",
                measurement: "% of work approved without revisions",
                target: ">= 95%",
                target_value: 95.0,
            },
            StandardKpi {
                name: "Process Efficiency",
                weight: 8.75,
                description: "Ability to complete tasks with minimal rework",
                measurement: "# of reworks per project or task (inverted)",
                target: "<= 10% rework",
                target_value: 90.0,
            },
            StandardKpi {
                name: "Documentation & Compliance",
                weight: 8.75,
                description: "Following team processes, SOPs, and file protocols",
                measurement: "Audit or lead review",
                target: "Full compliance",
                target_value: 100.0,
            },
        ],
    ),
    (
        "Collaboration & Team Engagement",
        20.0,
        [
            StandardKpi {
                name: "Cross-Team Communication",
                weight: 5.0,
                description: "Timely, professional interaction with colleagues and other teams",
                measurement: "Peer feedback survey",
                target: ">= 4/5",
                target_value: 80.0,
            },
            StandardKpi {
                name: "Meeting Participation",
                weight: 5.0,
                description: "Attendance and constructive contribution in meetings",
                measurement: "Attendance record + feedback",
                target: ">= 90% participation",
                target_value: 90.0,
            },
            StandardKpi {
                name: "Collaboration Quality",
                weight: 5.0,
                description: "How effectively the member works with others to achieve shared goals",
                measurement: "360 feedback",
                target: "Positive trend",
                target_value: 80.0,
            },
            StandardKpi {
                name: "Team Morale Contribution",
                weight: 5.0,
                description: "Proactive positivity, mentorship, or support of peers",
                measurement: "Peer/lead feedback",
                target: "Demonstrated contribution",
                target_value: 80.0,
            },
        ],
    ),
    (
        "Ownership & Initiative",
        20.0,
        [
            StandardKpi {
                name: "Accountability",
                weight: 5.0,
                description: "Consistency in following through on commitments",
                measurement: "Manager review + peer inputs",
                target: "Consistent accountability",
                target_value: 85.0,
            },
            StandardKpi {
                name: "Problem Solving",
                weight: 5.0,
                description: "Identifies and resolves issues proactively",
                measurement: "# of issues resolved without escalation",
                target: ">= 80%",
                target_value: 80.0,
            },
            StandardKpi {
                name: "Innovation & Continuous Improvement",
                weight: 5.0,
                description: "Suggestions, ideas, or efficiencies introduced",
                measurement: "# of improvements suggested or implemented",
                target: ">= 1 per quarter",
                target_value: 75.0,
            },
            StandardKpi {
                name: "Dependability Index",
                weight: 5.0,
                description: "Reliability under deadlines or pressure",
                measurement: "Lead assessment",
                target: "Above average",
                target_value: 85.0,
            },
        ],
    ),
    (
        "Learning & Growth",
        15.0,
        [
            StandardKpi {
                name: "Skill Advancement",
                weight: 3.75,
                description: "Participation in internal/external learning activities",
                measurement: "# of trainings, courses, or certifications completed",
                target: ">= 1 per quarter",
                target_value: 100.0,
            },
            StandardKpi {
                name: "Application of Learning",
                weight: 3.75,
                description: "Using new skills in actual work scenarios",
                measurement: "Evidence of application in deliverables",
                target: "Demonstrated improvement",
                target_value: 80.0,
            },
            StandardKpi {
                name: "Growth Goal Achievement",
                weight: 3.75,
                description: "Progress toward individual development plans",
                measurement: "% of personal goals met",
                target: ">= 80%",
                target_value: 80.0,
            },
            StandardKpi {
                name: "Knowledge Sharing",
                weight: 3.75,
                description: "Teaching or mentoring others on new skills",
                measurement: "# of sessions, guides, or shared learnings",
                target: ">= 1 per quarter",
                target_value: 100.0,
            },
        ],
    ),
    (
        "Business & Impact Alignment",
        10.0,
        [
            StandardKpi {
                name: "Impact on KPIs",
                weight: 2.5,
                description: "Contribution to key company/team metrics",
                measurement: "Direct link to department KPIs",
                target: "Documented alignment",
                target_value: 85.0,
            },
            StandardKpi {
                name: "Customer or Stakeholder Feedback",
                weight: 2.5,
                description: "External feedback on professionalism, quality, or communication",
                measurement: "Client or stakeholder rating",
                target: ">= 4/5",
                target_value: 80.0,
            },
            StandardKpi {
                name: "Efficiency Contribution",
                weight: 2.5,
                description: "Ideas or efforts that saved time, cost, or resources",
                measurement: "Quantified impact or manager validation",
                target: ">= 1 measurable improvement/quarter",
                target_value: 75.0,
            },
            StandardKpi {
                name: "Strategic Alignment",
                weight: 2.5,
                description: "Understanding and acting in line with company goals",
                measurement: "Leadership evaluation",
                target: "Strong alignment",
                target_value: 85.0,
            },
        ],
    ),
];

impl KpiCatalog {
    /// The built-in five-category, twenty-KPI taxonomy.
    pub fn standard() -> Self {
        let categories = STANDARD_CATEGORIES
            .iter()
            .map(|(category, weight, kpis)| CategoryDefinition {
                name: (*category).to_string(),
                weight: *weight,
                kpis: kpis
                    .iter()
                    .map(|kpi| KpiDefinition {
                        category: (*category).to_string(),
                        name: kpi.name.to_string(),
                        weight: kpi.weight,
                        description: Some(kpi.description.to_string()),
                        measurement: Some(kpi.measurement.to_string()),
                        target: Some(kpi.target.to_string()),
                        target_value: Some(kpi.target_value),
                    })
                    .collect(),
            })
            .collect();

        Self { categories }
    }

    pub fn new(categories: Vec<CategoryDefinition>) -> AppResult<Self> {
        let catalog = Self { categories };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        let file: CatalogFile = serde_yaml::from_str(raw)?;
        let categories = file
            .categories
            .into_iter()
            .map(|category| CategoryDefinition {
                kpis: category
                    .kpis
                    .into_iter()
                    .map(|kpi| KpiDefinition {
                        category: category.name.clone(),
                        name: kpi.name.trim().to_string(),
                        weight: kpi.weight,
                        description: kpi.description,
                        measurement: kpi.measurement,
                        target: kpi.target,
                        target_value: kpi.target_value,
                    })
                    .collect(),
                name: category.name,
                weight: category.weight,
            })
            .collect();
        Self::new(categories)
    }

    pub fn from_yaml_path(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&raw)?;
        info!(
            target: "app::config",
            path = %path.display(),
            categories = catalog.categories.len(),
            kpis = catalog.kpi_count(),
            "loaded KPI catalog"
        );
        Ok(catalog)
    }

    /// Checks the weight invariants: each category's KPI weights add up to the
    /// category weight and the category weights add up to 100.
    pub fn validate(&self) -> AppResult<()> {
        if self.categories.is_empty() {
            return Err(AppError::validation("KPI catalog has no categories"));
        }

        let mut category_names = HashSet::new();
        let mut kpi_names = HashSet::new();
        let mut total = 0.0;

        for category in &self.categories {
            if !category_names.insert(category.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
            if !(0.0..=TOTAL_CATEGORY_WEIGHT).contains(&category.weight) {
                return Err(AppError::validation(format!(
                    "category '{}' weight {} is outside 0-100",
                    category.name, category.weight
                )));
            }
            if category.kpis.is_empty() {
                return Err(AppError::validation(format!(
                    "category '{}' has no KPIs",
                    category.name
                )));
            }

            let mut kpi_total = 0.0;
            for kpi in &category.kpis {
                if kpi.name.is_empty() {
                    return Err(AppError::validation(format!(
                        "category '{}' contains a KPI without a name",
                        category.name
                    )));
                }
                if !kpi_names.insert(kpi.name.as_str()) {
                    return Err(AppError::validation(format!("duplicate KPI '{}'", kpi.name)));
                }
                if kpi.category != category.name {
                    return Err(AppError::validation(format!(
                        "KPI '{}' is filed under '{}' but declares category '{}'",
                        kpi.name, category.name, kpi.category
                    )));
                }
                if !kpi.weight.is_finite() || kpi.weight < 0.0 {
                    return Err(AppError::validation(format!(
                        "KPI '{}' weight must be a finite, non-negative number",
                        kpi.name
                    )));
                }
                if kpi.target_value.is_some_and(|target| !target.is_finite()) {
                    return Err(AppError::validation(format!(
                        "KPI '{}' target value must be a finite number",
                        kpi.name
                    )));
                }
                kpi_total += kpi.weight;
            }

            if (kpi_total - category.weight).abs() > WEIGHT_TOLERANCE {
                return Err(AppError::validation_with_details(
                    format!(
                        "KPI weights in '{}' sum to {kpi_total}, expected {}",
                        category.name, category.weight
                    ),
                    serde_json::json!({ "category": category.name, "kpiTotal": kpi_total }),
                ));
            }
            total += category.weight;
        }

        if (total - TOTAL_CATEGORY_WEIGHT).abs() > WEIGHT_TOLERANCE {
            return Err(AppError::validation_with_details(
                format!("category weights sum to {total}, expected 100"),
                serde_json::json!({ "categoryTotal": total }),
            ));
        }

        Ok(())
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|category| category.name == name)
    }

    pub fn kpis(&self) -> impl Iterator<Item = &KpiDefinition> {
        self.categories.iter().flat_map(|category| category.kpis.iter())
    }

    pub fn kpi(&self, name: &str) -> Option<&KpiDefinition> {
        self.kpis().find(|kpi| kpi.name == name)
    }

    pub fn kpi_count(&self) -> usize {
        self.categories.iter().map(|category| category.kpis.len()).sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.categories.iter().map(|category| category.weight).sum()
    }
}

impl Default for KpiCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
