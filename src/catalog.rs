/// Competency catalog for the degree. The catalog normally lives in the
/// `Competencies` sheet; the hardcoded default list below is only used to seed
/// a fresh workbook and as a fallback when the sheet is empty.
#[derive(Debug, Clone)]
pub struct Competency {
    pub code: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Category {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub key: String,
    pub label: String,
    pub items: Vec<(String, String)>,
}

pub const KIND_SOFT: &str = "Blanda (transversal)";
pub const KIND_HARD: &str = "Dura (técnica)";

pub const LEVELS: [&str; 3] = ["Básico", "Intermedio", "Avanzado"];
pub const CHANGE_TAGS: [&str; 3] = ["Confirmada", "Cambiada", "Nivel ajustado"];

const DEFAULT_CATEGORIES: [(&str, &str); 3] = [
    ("COM", "Competencias transversales"),
    ("CON", "Conocimientos: saber teórico"),
    ("HAB", "Habilidades: saber hacer"),
];

const DEFAULT_COMPETENCIES: [(&str, &str, &str); 22] = [
    ("COM2", "COM", "Aplicar y actualizar conocimiento sobre herramientas tecnológicas para producir, analizar y evaluar el impacto de productos y servicios digitales"),
    ("COM3", "COM", "Concebir, desarrollar, presentar y defender con eficacia proyectos viables en comunicación digital"),
    ("COM5", "COM", "Acceder y gestionar información en diferentes formatos y fuentes para obtener conocimiento fundamentado en datos"),
    ("COM6", "COM", "Trabajo colaborativo en equipos multidisciplinares y multilingües"),
    ("COM7", "COM", "Resolver problemas con iniciativa y creatividad"),
    ("COM8", "COM", "Tomar decisiones de forma autónoma y proactiva"),
    ("CON6", "CON", "Herramientas documentales para seleccionar, tratar, recuperar y evaluar datos e informaciones"),
    ("CON15", "CON", "Estrategias para acciones de marketing y publicidad digital"),
    ("CON16", "CON", "Modelos de negocio para emprender en el entorno digital"),
    ("CON18", "CON", "Contexto socio-profesional y de producción, organización y publicación en internet"),
    ("CON19", "CON", "Principios básicos de organización y funcionamiento de la web y aplicaciones interactivas"),
    ("CON20", "CON", "Modelos de gestión de comunidades sociales y espacios digitales"),
    ("CON27", "CON", "Herramientas para diseño estratégico de campañas automatizadas"),
    ("CON28", "CON", "Técnicas para la expresión correcta en producción de contenidos digitales"),
    ("HAB2", "HAB", "Emitir juicios críticos sobre productos y servicios en el entorno digital"),
    ("HAB9", "HAB", "Usar procedimientos y herramientas de documentación en comunicación digital"),
    ("HAB10", "HAB", "Manejar programas y lenguajes para desarrollo web y aplicaciones interactivas"),
    ("HAB20", "HAB", "Comunicación oral eficiente en entornos profesionales"),
    ("HAB21", "HAB", "Diseñar y supervisar planes de social media y campañas publicitarias digitales"),
    ("HAB22", "HAB", "Elaborar informes sobre nichos de negocio digitales"),
    ("HAB23", "HAB", "Diseñar campañas de publicidad para alcanzar objetivos y públicos deseados"),
    ("HAB26", "HAB", "Ajustar propuestas de productos digitales a normativa legal y autorregulación profesional"),
];

#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
    items: Vec<Competency>,
    // Category positions sorted longest-prefix-first. A code like "CP3" must
    // classify under "CP" even when a shorter category "C" is also defined, so
    // the nested prefix can never win.
    prefix_order: Vec<usize>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>, items: Vec<Competency>) -> Self {
        let mut prefix_order: Vec<usize> = (0..categories.len()).collect();
        prefix_order.sort_by(|&a, &b| {
            categories[b]
                .key
                .len()
                .cmp(&categories[a].key.len())
                .then(a.cmp(&b))
        });
        Catalog {
            categories,
            items,
            prefix_order,
        }
    }

    pub fn default_catalog() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(key, label)| Category {
                key: key.to_string(),
                label: label.to_string(),
            })
            .collect();
        let items = DEFAULT_COMPETENCIES
            .iter()
            .map(|(code, category, description)| Competency {
                code: code.to_string(),
                category: category.to_string(),
                description: description.to_string(),
            })
            .collect();
        Catalog::new(categories, items)
    }

    /// Build a catalog from the `Competencies` sheet rows. The three degree
    /// categories are always present; categories that only appear in the sheet
    /// are appended with the key as label.
    pub fn from_rows(rows: &[(String, String, String)]) -> Self {
        let mut categories: Vec<Category> = DEFAULT_CATEGORIES
            .iter()
            .map(|(key, label)| Category {
                key: key.to_string(),
                label: label.to_string(),
            })
            .collect();
        let mut items = Vec::new();
        for (code, category, description) in rows {
            let code = code.trim().to_string();
            if code.is_empty() {
                continue;
            }
            let category = category.trim().to_string();
            if !category.is_empty() && !categories.iter().any(|c| c.key == category) {
                categories.push(Category {
                    key: category.clone(),
                    label: category.clone(),
                });
            }
            items.push(Competency {
                code,
                category,
                description: description.trim().to_string(),
            });
        }
        Catalog::new(categories, items)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn items(&self) -> &[Competency] {
        &self.items
    }

    /// Category key for a competency code, longest matching prefix wins.
    pub fn classify(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        for &i in &self.prefix_order {
            if code.starts_with(self.categories[i].key.as_str()) {
                return Some(self.categories[i].key.as_str());
            }
        }
        None
    }

    /// Soft/hard kind used by the phase rows. Transversal (COM) competencies
    /// are soft, everything else hard.
    pub fn kind(&self, code: &str) -> &'static str {
        match self.classify(code) {
            Some("COM") => KIND_SOFT,
            _ => KIND_HARD,
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = code.trim();
        self.items.iter().any(|c| c.code == code)
    }

    pub fn description(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        self.items
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.description.as_str())
    }

    /// Position in catalog insertion order, used as a stable tie-breaker when
    /// ranking competency frequencies.
    pub fn position(&self, code: &str) -> Option<usize> {
        let code = code.trim();
        self.items.iter().position(|c| c.code == code)
    }

    /// code → description, preserving insertion order.
    pub fn flatten(&self) -> Vec<(String, String)> {
        self.items
            .iter()
            .map(|c| (c.code.clone(), c.description.clone()))
            .collect()
    }

    /// Competencies grouped by classified category, categories in declaration
    /// order, codes in insertion order. Codes that classify into no category
    /// are dropped, matching the source-of-truth sheet semantics.
    pub fn group_by_category(&self) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = self
            .categories
            .iter()
            .map(|c| CategoryGroup {
                key: c.key.clone(),
                label: c.label.clone(),
                items: Vec::new(),
            })
            .collect();
        for item in &self.items {
            if let Some(key) = self.classify(&item.code) {
                let key = key.to_string();
                if let Some(group) = groups.iter_mut().find(|g| g.key == key) {
                    group.items.push((item.code.clone(), item.description.clone()));
                }
            }
        }
        groups
    }
}
