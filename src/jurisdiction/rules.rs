// =============================================================================
// jurisdiction/rules.rs — THE RULE BOOK
// =============================================================================
//
// Static per-court configuration: procedural flags, time limits, local acts,
// the procedural emphasis each bench is known for, and how much weight it
// gives to precedent from each kind of court. Four High Courts ship built
// in; everything else gets the default rules. An optional JSON file can add
// courts or override the built-in ones without a redeploy.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read court rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse court rules file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The procedural trait a court is known for. Drives the jurisdiction
/// filter's procedural heuristic.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProceduralEmphasis {
    SpeedyResolution,
    ThoroughAnalysis,
    LegalPrecision,
    TechnologyIntegration,
    #[default]
    StandardProcedure,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Digital,
    Hybrid,
    #[default]
    Traditional,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProceduralPreferences {
    #[serde(default)]
    pub emphasis: ProceduralEmphasis,
    #[serde(default)]
    pub documentation: String,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourtRules {
    pub commercial_court_division: bool,
    pub fast_track_procedures: bool,
    pub mediation_mandatory: bool,
    pub document_filing_format: DocumentFormat,
    pub case_time_limit_days: u32,
    pub appeal_period_days: u32,
    pub specialized_judges: bool,
    #[serde(default)]
    pub local_acts: Vec<String>,
    pub procedural_preferences: ProceduralPreferences,
}

impl Default for CourtRules {
    /// The rules assumed for any court we have no table entry for.
    fn default() -> Self {
        Self {
            commercial_court_division: false,
            fast_track_procedures: false,
            mediation_mandatory: false,
            document_filing_format: DocumentFormat::Traditional,
            case_time_limit_days: 365,
            appeal_period_days: 90,
            specialized_judges: false,
            local_acts: Vec::new(),
            procedural_preferences: ProceduralPreferences {
                emphasis: ProceduralEmphasis::StandardProcedure,
                documentation: "standard".to_string(),
                evidence: "balanced".to_string(),
            },
        }
    }
}

/// Multipliers a court applies to precedent by originating-court category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PrecedentWeights {
    pub same_court: f64,
    pub supreme_court: f64,
    pub other_high_courts: f64,
    pub international: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProceduralCode {
    pub limit: String,
    pub procedure: String,
    pub evidence: String,
}

/// On-disk shape of the optional overrides file. Every table is optional.
#[derive(Debug, Default, Deserialize)]
pub struct RuleBookFile {
    #[serde(default)]
    pub courts: HashMap<String, CourtRules>,
    #[serde(default)]
    pub precedent_weights: HashMap<String, PrecedentWeights>,
    #[serde(default)]
    pub procedural_codes: HashMap<String, ProceduralCode>,
}

/// Read-only lookup tables keyed by court name (exact match).
#[derive(Debug, Clone)]
pub struct RuleBook {
    courts: HashMap<String, CourtRules>,
    precedent_weights: HashMap<String, PrecedentWeights>,
    procedural_codes: HashMap<String, ProceduralCode>,
    default_rules: CourtRules,
}

impl RuleBook {
    /// The built-in tables for the Delhi, Bombay, Calcutta and Madras
    /// High Courts.
    pub fn builtin() -> Self {
        let mut courts = HashMap::new();
        courts.insert(
            "Delhi High Court".to_string(),
            court(
                (true, true, true, true),
                DocumentFormat::Digital,
                (180, 30),
                &["Delhi Commercial Courts Act", "Delhi Rent Control Act"],
                (ProceduralEmphasis::SpeedyResolution, "extensive", "digital_preferred"),
            ),
        );
        courts.insert(
            "Bombay High Court".to_string(),
            court(
                (true, true, false, true),
                DocumentFormat::Hybrid,
                (240, 45),
                &["Maharashtra Rent Control Act", "Bombay Stamp Act"],
                (ProceduralEmphasis::ThoroughAnalysis, "detailed", "traditional_preferred"),
            ),
        );
        courts.insert(
            "Calcutta High Court".to_string(),
            court(
                (true, false, true, false),
                DocumentFormat::Traditional,
                (300, 60),
                &["West Bengal Commercial Courts Act", "West Bengal Land Reforms Act"],
                (ProceduralEmphasis::LegalPrecision, "comprehensive", "traditional_required"),
            ),
        );
        courts.insert(
            "Madras High Court".to_string(),
            court(
                (true, true, true, true),
                DocumentFormat::Digital,
                (210, 30),
                &["Tamil Nadu Commercial Courts Act", "Tamil Nadu Buildings Act"],
                (ProceduralEmphasis::TechnologyIntegration, "digital_preferred", "digital_accepted"),
            ),
        );

        let mut precedent_weights = HashMap::new();
        precedent_weights.insert("Delhi High Court".to_string(), weights(2.0, 1.8, 1.2, 0.8));
        precedent_weights.insert("Bombay High Court".to_string(), weights(2.0, 1.7, 1.3, 0.9));
        precedent_weights.insert("Calcutta High Court".to_string(), weights(2.0, 1.9, 1.1, 0.7));
        precedent_weights.insert("Madras High Court".to_string(), weights(2.0, 1.8, 1.2, 0.8));

        let mut procedural_codes = HashMap::new();
        procedural_codes.insert(
            "commercial_disputes".to_string(),
            code("value_based", "summary_judgment", "document_heavy"),
        );
        procedural_codes.insert(
            "civil_suits".to_string(),
            code("jurisdiction_based", "standard", "balanced"),
        );
        procedural_codes.insert(
            "corporate_matters".to_string(),
            code("specialized", "expedited", "expert_heavy"),
        );

        Self {
            courts,
            precedent_weights,
            procedural_codes,
            default_rules: CourtRules::default(),
        }
    }

    /// Built-in tables, extended by the overrides file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, RulesError> {
        let mut book = Self::builtin();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file: RuleBookFile = serde_json::from_str(&raw).map_err(|source| RulesError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            book.merge(file);
            info!(path = %path.display(), courts = book.courts.len(), "Court rules overrides loaded");
        }
        Ok(book)
    }

    /// Entries in `file` replace same-named entries already in the book.
    pub fn merge(&mut self, file: RuleBookFile) {
        self.courts.extend(file.courts);
        self.precedent_weights.extend(file.precedent_weights);
        self.procedural_codes.extend(file.procedural_codes);
    }

    /// Rules for `court`, or the default rules for a court we don't know.
    pub fn court_rules(&self, court: &str) -> &CourtRules {
        self.courts.get(court).unwrap_or(&self.default_rules)
    }

    pub fn is_known_court(&self, court: &str) -> bool {
        self.courts.contains_key(court)
    }

    pub fn precedent_weights(&self, court: &str) -> Option<&PrecedentWeights> {
        self.precedent_weights.get(court)
    }

    pub fn procedural_code(&self, case_type: &str) -> Option<&ProceduralCode> {
        self.procedural_codes.get(case_type)
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::builtin()
    }
}

fn court(
    (commercial, fast_track, mediation, specialized): (bool, bool, bool, bool),
    format: DocumentFormat,
    (time_limit, appeal): (u32, u32),
    local_acts: &[&str],
    (emphasis, documentation, evidence): (ProceduralEmphasis, &str, &str),
) -> CourtRules {
    CourtRules {
        commercial_court_division: commercial,
        fast_track_procedures: fast_track,
        mediation_mandatory: mediation,
        document_filing_format: format,
        case_time_limit_days: time_limit,
        appeal_period_days: appeal,
        specialized_judges: specialized,
        local_acts: local_acts.iter().map(|a| a.to_string()).collect(),
        procedural_preferences: ProceduralPreferences {
            emphasis,
            documentation: documentation.to_string(),
            evidence: evidence.to_string(),
        },
    }
}

fn weights(same_court: f64, supreme_court: f64, other_high_courts: f64, international: f64) -> PrecedentWeights {
    PrecedentWeights {
        same_court,
        supreme_court,
        other_high_courts,
        international,
    }
}

fn code(limit: &str, procedure: &str, evidence: &str) -> ProceduralCode {
    ProceduralCode {
        limit: limit.to_string(),
        procedure: procedure.to_string(),
        evidence: evidence.to_string(),
    }
}
