use std::fmt;
use std::str::FromStr;

/// What a named style guide describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Artist,
    Style,
}

impl SubjectKind {
    /// Phrase used when describing the subject to the model.
    pub fn description(self) -> &'static str {
        match self {
            SubjectKind::Artist => "artist",
            SubjectKind::Style => "artistic style or movement",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Artist => f.write_str("artist"),
            SubjectKind::Style => f.write_str("style"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredSection {
    VisualCharacteristics,
    ColorPalette,
    Composition,
    Technique,
    Mood,
}

impl RequiredSection {
    pub const ALL: [RequiredSection; 5] = [
        RequiredSection::VisualCharacteristics,
        RequiredSection::ColorPalette,
        RequiredSection::Composition,
        RequiredSection::Technique,
        RequiredSection::Mood,
    ];

    /// Heading used in generated guides.
    pub fn heading(self) -> &'static str {
        match self {
            RequiredSection::VisualCharacteristics => "Core Characteristics",
            RequiredSection::ColorPalette => "Color Palette",
            RequiredSection::Composition => "Composition",
            RequiredSection::Technique => "Technique",
            RequiredSection::Mood => "Mood",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            RequiredSection::VisualCharacteristics => {
                &["core characteristics", "visual characteristics"]
            }
            RequiredSection::ColorPalette => &["color", "colour", "palette"],
            RequiredSection::Composition => &["composition"],
            RequiredSection::Technique => &["technique", "technical"],
            RequiredSection::Mood => &["mood", "atmosphere"],
        }
    }

    fn matches(self, heading: &str) -> bool {
        let heading = heading.to_lowercase();
        self.keywords()
            .iter()
            .any(|keyword| heading.contains(keyword))
    }
}

impl fmt::Display for RequiredSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

/// A markdown document describing a visual language, keyed by its slug.
///
/// Guides are immutable once produced: composition only ever reads the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleGuide {
    slug: String,
    body: String,
}

impl StyleGuide {
    pub fn new(slug: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            body: body.into(),
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Text of the first level-one heading.
    pub fn title(&self) -> Option<&str> {
        self.body.lines().find_map(|line| {
            line.trim_start()
                .strip_prefix("# ")
                .map(str::trim)
                .filter(|title| !title.is_empty())
        })
    }

    /// Body of the `##` section matching `section`, trimmed.
    pub fn section(&self, section: RequiredSection) -> Option<String> {
        let mut collected: Option<Vec<&str>> = None;

        for line in self.body.lines() {
            let trimmed = line.trim_start();
            if let Some(heading) = trimmed.strip_prefix("## ") {
                if collected.is_some() {
                    break;
                }
                if section.matches(heading) {
                    collected = Some(Vec::new());
                }
                continue;
            }
            if trimmed.starts_with("# ") && collected.is_some() {
                break;
            }
            if let Some(lines) = collected.as_mut() {
                lines.push(line);
            }
        }

        collected.map(|lines| lines.join("\n").trim().to_string())
    }

    /// Required sections that are absent or have no text.
    pub fn missing_sections(&self) -> Vec<RequiredSection> {
        RequiredSection::ALL
            .into_iter()
            .filter(|section| self.section(*section).is_none_or(|text| text.is_empty()))
            .collect()
    }
}

impl FromStr for SubjectKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "artist" => Ok(SubjectKind::Artist),
            "style" | "movement" => Ok(SubjectKind::Style),
            other => Err(format!("unknown subject kind `{other}`")),
        }
    }
}
