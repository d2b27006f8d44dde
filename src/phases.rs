use serde::Deserialize;

use crate::catalog::{Catalog, CHANGE_TAGS, LEVELS};
use crate::filter::SessionCtx;
use crate::store::{SheetStore, StoreError};

pub const SHEET_USERS: &str = "Users";
pub const SHEET_COMPANIES: &str = "Companies";
pub const SHEET_COMPETENCIES: &str = "Competencies";
pub const SHEET_PHASE1: &str = "Phase1_PreEvent";
pub const SHEET_PHASE2: &str = "Phase2_Event";
pub const SHEET_PHASE3: &str = "Phase3_PostEvent";

/// Sentinel company name that marks the one-per-student reflection row in the
/// Phase 3 sheet.
pub const REFLECTION_SENTINEL: &str = "REFLEXION_GENERAL";

pub const USERS_HEADER: [&str; 5] = [
    "username",
    "access_code",
    "display_name",
    "group",
    "registered_at",
];

pub const COMPANIES_HEADER: [&str; 5] = ["id", "name", "sector", "web", "description"];

pub const COMPETENCIES_HEADER: [&str; 3] = ["code", "category", "description"];

pub const PHASE1_HEADER: [&str; 13] = [
    "timestamp",
    "username",
    "display_name",
    "group",
    "company_id",
    "company_name",
    "main_activity",
    "digital_presence",
    "target_profiles",
    "competency_code",
    "competency_kind",
    "competency_rationale",
    "competency_level",
];

pub const PHASE2_HEADER: [&str; 17] = [
    "timestamp",
    "username",
    "display_name",
    "group",
    "company_name",
    "contact_person",
    "contact_role",
    "contact_linkedin",
    "digital_work",
    "profiles_sought",
    "technical_skills",
    "soft_skills",
    "university_gap",
    "internship_opportunities",
    "advice",
    "surprise",
    "pitch_used",
];

pub const PHASE3_HEADER: [&str; 16] = [
    "timestamp",
    "username",
    "display_name",
    "group",
    "company_name",
    "competency_code",
    "competency_kind",
    "rationale_v2",
    "level_v2",
    "change_vs_v1",
    "most_demanded",
    "surprising_competencies",
    "university_gap",
    "personal_positioning",
    "action_plan",
    "experience_rating",
];

pub const ALL_SHEETS: [&str; 6] = [
    SHEET_USERS,
    SHEET_COMPANIES,
    SHEET_COMPETENCIES,
    SHEET_PHASE1,
    SHEET_PHASE2,
    SHEET_PHASE3,
];

/// First-run bootstrap: create any missing sheet with its fixed header and
/// seed the competency sheet with the default catalog. Existing sheets are
/// never touched. Returns the names of the sheets that were created.
pub fn ensure_sheets(store: &mut SheetStore, catalog: &Catalog) -> Result<Vec<String>, StoreError> {
    let mut created = Vec::new();
    let layout: [(&str, &[&str]); 6] = [
        (SHEET_USERS, &USERS_HEADER),
        (SHEET_COMPANIES, &COMPANIES_HEADER),
        (SHEET_COMPETENCIES, &COMPETENCIES_HEADER),
        (SHEET_PHASE1, &PHASE1_HEADER),
        (SHEET_PHASE2, &PHASE2_HEADER),
        (SHEET_PHASE3, &PHASE3_HEADER),
    ];
    for (name, header) in layout {
        if store.ensure_sheet(name, header)? {
            if name == SHEET_COMPETENCIES {
                let rows: Vec<Vec<String>> = catalog
                    .items()
                    .iter()
                    .map(|c| {
                        vec![
                            c.code.clone(),
                            c.category.clone(),
                            c.description.clone(),
                        ]
                    })
                    .collect();
                store.append_rows(name, &rows)?;
            }
            created.push(name.to_string());
        }
    }
    Ok(created)
}

/// Company id slug, derived the same way the admin add-company path does:
/// lowercased, spaces to underscores, capped at 20 chars.
pub fn company_slug(name: &str) -> String {
    let slug: String = name.trim().to_lowercase().replace(' ', "_");
    slug.chars().take(20).collect()
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn validate_level(level: &str) -> Result<(), String> {
    let level = level.trim();
    if !level.is_empty() && !LEVELS.contains(&level) {
        return Err(format!("unknown level: {}", level));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyChoice {
    pub code: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Payload {
    pub company_name: String,
    #[serde(default)]
    pub company_id: String,
    #[serde(default)]
    pub main_activity: String,
    #[serde(default)]
    pub digital_presence: String,
    #[serde(default)]
    pub target_profiles: String,
    #[serde(default)]
    pub competencies: Vec<CompetencyChoice>,
}

impl Phase1Payload {
    /// Validation happens before any store call; an empty payload must never
    /// reach the upsert protocol.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), String> {
        if self.company_name.trim().is_empty() {
            return Err("companyName must not be empty".to_string());
        }
        if self.main_activity.trim().is_empty() {
            return Err("mainActivity must not be empty".to_string());
        }
        if self.competencies.is_empty() {
            return Err("select at least one competency".to_string());
        }
        for choice in &self.competencies {
            if !catalog.contains(&choice.code) {
                return Err(format!("unknown competency code: {}", choice.code));
            }
            validate_level(&choice.level)?;
        }
        Ok(())
    }

    /// One row per selected competency; the analysis fields are denormalized
    /// across all rows for the same (user, company).
    pub fn rows(&self, ctx: &SessionCtx, catalog: &Catalog, timestamp: &str) -> Vec<Vec<String>> {
        let company_name = self.company_name.trim().to_string();
        let company_id = if self.company_id.trim().is_empty() {
            company_slug(&company_name)
        } else {
            self.company_id.trim().to_string()
        };
        self.competencies
            .iter()
            .map(|choice| {
                vec![
                    timestamp.to_string(),
                    ctx.username.clone(),
                    ctx.display_name.clone(),
                    ctx.group.clone(),
                    company_id.clone(),
                    company_name.clone(),
                    self.main_activity.trim().to_string(),
                    self.digital_presence.trim().to_string(),
                    self.target_profiles.trim().to_string(),
                    choice.code.trim().to_string(),
                    catalog.kind(&choice.code).to_string(),
                    choice.rationale.trim().to_string(),
                    choice.level.trim().to_string(),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Payload {
    pub company_name: String,
    #[serde(default)]
    pub contact_person: String,
    #[serde(default)]
    pub contact_role: String,
    #[serde(default)]
    pub contact_linkedin: String,
    #[serde(default)]
    pub digital_work: String,
    #[serde(default)]
    pub profiles_sought: String,
    #[serde(default)]
    pub technical_skills: String,
    #[serde(default)]
    pub soft_skills: String,
    #[serde(default)]
    pub university_gap: String,
    #[serde(default)]
    pub internship_opportunities: String,
    #[serde(default)]
    pub advice: String,
    #[serde(default)]
    pub surprise: String,
    #[serde(default)]
    pub pitch_used: String,
}

impl Phase2Payload {
    pub fn validate(&self) -> Result<(), String> {
        if self.company_name.trim().is_empty() {
            return Err("companyName must not be empty".to_string());
        }
        Ok(())
    }

    pub fn row(&self, ctx: &SessionCtx, timestamp: &str) -> Vec<String> {
        vec![
            timestamp.to_string(),
            ctx.username.clone(),
            ctx.display_name.clone(),
            ctx.group.clone(),
            self.company_name.trim().to_string(),
            self.contact_person.trim().to_string(),
            self.contact_role.trim().to_string(),
            self.contact_linkedin.trim().to_string(),
            self.digital_work.trim().to_string(),
            self.profiles_sought.trim().to_string(),
            self.technical_skills.trim().to_string(),
            self.soft_skills.trim().to_string(),
            self.university_gap.trim().to_string(),
            self.internship_opportunities.trim().to_string(),
            self.advice.trim().to_string(),
            self.surprise.trim().to_string(),
            self.pitch_used.trim().to_string(),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase3Choice {
    pub code: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub change: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase3CompetenciesPayload {
    pub company_name: String,
    #[serde(default)]
    pub competencies: Vec<Phase3Choice>,
}

impl Phase3CompetenciesPayload {
    pub fn validate(&self, catalog: &Catalog) -> Result<(), String> {
        let company = self.company_name.trim();
        if company.is_empty() {
            return Err("companyName must not be empty".to_string());
        }
        if company.eq_ignore_ascii_case(REFLECTION_SENTINEL) {
            return Err("companyName is reserved".to_string());
        }
        if self.competencies.is_empty() {
            return Err("select at least one competency".to_string());
        }
        for choice in &self.competencies {
            if !catalog.contains(&choice.code) {
                return Err(format!("unknown competency code: {}", choice.code));
            }
            validate_level(&choice.level)?;
            let change = choice.change.trim();
            if !change.is_empty() && !CHANGE_TAGS.contains(&change) {
                return Err(format!("unknown change tag: {}", change));
            }
        }
        Ok(())
    }

    pub fn rows(&self, ctx: &SessionCtx, catalog: &Catalog, timestamp: &str) -> Vec<Vec<String>> {
        let company_name = self.company_name.trim().to_string();
        self.competencies
            .iter()
            .map(|choice| {
                vec![
                    timestamp.to_string(),
                    ctx.username.clone(),
                    ctx.display_name.clone(),
                    ctx.group.clone(),
                    company_name.clone(),
                    choice.code.trim().to_string(),
                    catalog.kind(&choice.code).to_string(),
                    choice.rationale.trim().to_string(),
                    choice.level.trim().to_string(),
                    choice.change.trim().to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase3ReflectionPayload {
    #[serde(default)]
    pub most_demanded: String,
    #[serde(default)]
    pub surprising_competencies: String,
    #[serde(default)]
    pub university_gap: String,
    #[serde(default)]
    pub personal_positioning: String,
    #[serde(default)]
    pub action_plan: String,
    #[serde(default)]
    pub experience_rating: String,
}

impl Phase3ReflectionPayload {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            &self.most_demanded,
            &self.surprising_competencies,
            &self.university_gap,
            &self.personal_positioning,
            &self.action_plan,
            &self.experience_rating,
        ];
        if fields.iter().all(|f| f.trim().is_empty()) {
            return Err("fill in at least one reflection field".to_string());
        }
        Ok(())
    }

    pub fn row(&self, ctx: &SessionCtx, timestamp: &str) -> Vec<String> {
        vec![
            timestamp.to_string(),
            ctx.username.clone(),
            ctx.display_name.clone(),
            ctx.group.clone(),
            REFLECTION_SENTINEL.to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            self.most_demanded.trim().to_string(),
            self.surprising_competencies.trim().to_string(),
            self.university_gap.trim().to_string(),
            self.personal_positioning.trim().to_string(),
            self.action_plan.trim().to_string(),
            self.experience_rating.trim().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, KIND_HARD, KIND_SOFT};
    use crate::store::{MemoryBook, RetryPolicy, SheetStore};

    fn ctx() -> SessionCtx {
        SessionCtx {
            username: "ana01".to_string(),
            display_name: "Ana García".to_string(),
            group: "G1".to_string(),
        }
    }

    #[test]
    fn phase1_rows_match_header_width() {
        let catalog = Catalog::default_catalog();
        let payload = Phase1Payload {
            company_name: "Acme".to_string(),
            company_id: String::new(),
            main_activity: "ads".to_string(),
            digital_presence: "web".to_string(),
            target_profiles: "juniors".to_string(),
            competencies: vec![
                CompetencyChoice {
                    code: "COM2".to_string(),
                    rationale: "fits".to_string(),
                    level: "Intermedio".to_string(),
                },
                CompetencyChoice {
                    code: "HAB9".to_string(),
                    rationale: String::new(),
                    level: String::new(),
                },
            ],
        };
        payload.validate(&catalog).unwrap();
        let rows = payload.rows(&ctx(), &catalog, "2026-03-02T11:00:00Z");
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.len(), PHASE1_HEADER.len());
        }
        assert_eq!(rows[0][4], "acme");
        assert_eq!(rows[0][10], KIND_SOFT);
        assert_eq!(rows[1][10], KIND_HARD);
        // Analysis fields are denormalized across every competency row.
        assert_eq!(rows[0][6], rows[1][6]);
    }

    #[test]
    fn phase1_validation_rejects_empty_payloads() {
        let catalog = Catalog::default_catalog();
        let mut payload = Phase1Payload {
            company_name: "Acme".to_string(),
            company_id: String::new(),
            main_activity: "ads".to_string(),
            digital_presence: String::new(),
            target_profiles: String::new(),
            competencies: Vec::new(),
        };
        assert!(payload.validate(&catalog).is_err());
        payload.competencies.push(CompetencyChoice {
            code: "NOPE1".to_string(),
            rationale: String::new(),
            level: String::new(),
        });
        assert!(payload.validate(&catalog).is_err());
        payload.competencies[0].code = "COM2".to_string();
        payload.main_activity = String::new();
        assert!(payload.validate(&catalog).is_err());
    }

    #[test]
    fn phase2_row_matches_header_width() {
        let payload = Phase2Payload {
            company_name: " Acme ".to_string(),
            contact_person: "Luis".to_string(),
            contact_role: "CTO".to_string(),
            contact_linkedin: String::new(),
            digital_work: "campaigns".to_string(),
            profiles_sought: String::new(),
            technical_skills: String::new(),
            soft_skills: String::new(),
            university_gap: String::new(),
            internship_opportunities: String::new(),
            advice: String::new(),
            surprise: String::new(),
            pitch_used: String::new(),
        };
        payload.validate().unwrap();
        let row = payload.row(&ctx(), "ts");
        assert_eq!(row.len(), PHASE2_HEADER.len());
        assert_eq!(row[4], "Acme");
    }

    #[test]
    fn phase3_rows_and_reflection_share_the_header() {
        let catalog = Catalog::default_catalog();
        let comp = Phase3CompetenciesPayload {
            company_name: "Acme".to_string(),
            competencies: vec![Phase3Choice {
                code: "CON15".to_string(),
                rationale: "confirmed".to_string(),
                level: "Avanzado".to_string(),
                change: "Confirmada".to_string(),
            }],
        };
        comp.validate(&catalog).unwrap();
        let rows = comp.rows(&ctx(), &catalog, "ts");
        assert_eq!(rows[0].len(), PHASE3_HEADER.len());

        let reflection = Phase3ReflectionPayload {
            most_demanded: "COM5".to_string(),
            surprising_competencies: String::new(),
            university_gap: String::new(),
            personal_positioning: String::new(),
            action_plan: String::new(),
            experience_rating: String::new(),
        };
        reflection.validate().unwrap();
        let row = reflection.row(&ctx(), "ts");
        assert_eq!(row.len(), PHASE3_HEADER.len());
        assert_eq!(row[4], REFLECTION_SENTINEL);
    }

    #[test]
    fn phase3_rejects_reserved_company_name() {
        let catalog = Catalog::default_catalog();
        let comp = Phase3CompetenciesPayload {
            company_name: "reflexion_general".to_string(),
            competencies: vec![Phase3Choice {
                code: "CON15".to_string(),
                rationale: String::new(),
                level: String::new(),
                change: String::new(),
            }],
        };
        assert!(comp.validate(&catalog).is_err());
    }

    #[test]
    fn empty_reflection_is_rejected() {
        let reflection = Phase3ReflectionPayload {
            most_demanded: String::new(),
            surprising_competencies: String::new(),
            university_gap: " ".to_string(),
            personal_positioning: String::new(),
            action_plan: String::new(),
            experience_rating: String::new(),
        };
        assert!(reflection.validate().is_err());
    }

    #[test]
    fn ensure_sheets_seeds_the_default_catalog_once() {
        let catalog = Catalog::default_catalog();
        let mut store = SheetStore::new(Box::new(MemoryBook::new()), RetryPolicy::immediate());
        let created = ensure_sheets(&mut store, &catalog).unwrap();
        assert_eq!(created.len(), 6);
        let comps = store.read_table(SHEET_COMPETENCIES).unwrap();
        assert_eq!(comps.rows.len(), 22);

        let created_again = ensure_sheets(&mut store, &catalog).unwrap();
        assert!(created_again.is_empty());
        assert_eq!(store.read_table(SHEET_COMPETENCIES).unwrap().rows.len(), 22);
    }

    #[test]
    fn company_slug_is_lowercased_and_capped() {
        assert_eq!(company_slug("Acme Digital"), "acme_digital");
        assert_eq!(
            company_slug("A Very Long Company Name Indeed"),
            "a_very_long_company_"
        );
    }
}
