use crate::guide::SubjectKind;

pub const SYSTEM_INSTRUCTION: &str = "You are an expert art historian and visual style analyst. \
You describe visual language precisely enough for an image generation model to reproduce it.";

/// Format template shown to the model when it writes a guide.
pub const EXAMPLE_STYLE_GUIDE: &str = "# Katsushika Hokusai Style Guide

## Core Characteristics
- Confident, calligraphic contour lines defining every form
- Flat areas of colour layered from separate woodblocks
- Nature rendered as pattern: waves, clouds and rain become rhythmic motifs
- Everyday figures dwarfed by monumental landscape
- Mount Fuji or another fixed landmark anchoring the scene

## Color Palette
- Prussian blue in deep and diluted tones dominates
- Warm buff and pale ochre paper tones for skies and ground
- Accents of muted red, soft green and charcoal black
- Gradated bands (bokashi) across skies and water
- Limited palette with strong value contrast

## Composition
- Bold diagonals and sweeping curves leading the eye
- Dramatic foreground framing against a distant focal point
- High horizon lines and stacked planes instead of linear depth
- Asymmetric balance with generous negative space
- Repetition of shapes echoing between foreground and background

## Technique
- Woodblock print look with crisp, even outlines
- Flat colour fields with subtle wood-grain texture
- Fine parallel hatching for rain, mist and water spray
- No painterly brushwork or impasto
- Clean registration between colour layers

## Mood
- Awe at the scale and force of nature
- Quiet dignity of ordinary working life
- Tension held in stillness, as in a wave about to break
- Contemplative and slightly melancholic
- Timeless, seasonal atmosphere

## Application Note
Apply these characteristics while keeping the requested subject clearly recognisable.
The style should shape how the subject is drawn, not replace it.
";

/// Instruction for a guide about a named artist or movement.
pub fn named_subject_instruction(label: &str, kind: SubjectKind) -> String {
    format!(
        "Create a detailed style guide for image generation that captures the distinctive \
characteristics of {label} ({kind}).

Your style guide must follow this exact format and level of detail:

{EXAMPLE_STYLE_GUIDE}
Create a comprehensive style guide for {label} that includes:
1. Core Characteristics - the most distinctive visual elements
2. Color Palette - specific colors and color relationships
3. Composition - how space and elements are arranged
4. Technique - brushwork, mark-making, or technical approach
5. Mood - the emotional and atmospheric qualities
6. Application Note - how to apply the style while keeping the subject matter clear

Be specific. Focus on visual characteristics an image generation model can understand and reproduce; \
the guide will be reused across many images that must share these stylistic elements.

Return ONLY the markdown-formatted style guide, starting with the title.",
        kind = kind.description(),
    )
}

pub const IMAGE_ANALYSIS_INSTRUCTION: &str = "Describe the distinctive visual style of this image in detail.
Cover the following categories:

1. **Core Characteristics**: the most distinctive visual elements
2. **Color Palette**: specific colors, color relationships and overall color mood
3. **Composition**: how space and elements are arranged, perspective, balance
4. **Technique**: brushwork, mark-making, texture or other visible technical approach
5. **Mood**: the emotional and atmospheric qualities
6. **Subject Matter**: what is depicted

Be specific and focus on characteristics that could be used to recreate a similar style.
Use a clear heading for each category.";

/// Instruction that unifies per-image analyses into one guide.
pub fn synthesis_instruction(analyses: &[String]) -> String {
    let combined = analyses
        .iter()
        .enumerate()
        .map(|(index, analysis)| format!("## Image {} Analysis\n{}", index + 1, analysis.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    let count = analyses.len();

    format!(
        "You have been given detailed analyses of {count} images. Identify the visual patterns \
they have in common and turn them into one unified style guide.

Here are the individual image analyses:

{combined}

---

Based on these analyses, write a style guide that captures the CONSISTENT elements across the images. \
Follow this exact format:

{EXAMPLE_STYLE_GUIDE}
Your style guide should:
1. Keep only patterns that appear in more than one image
2. Focus on visual characteristics that can be reproduced
3. Note the range of variation within the style
4. Be specific about colors, composition, technique and mood
5. End with an Application Note explaining how to apply the style while keeping the subject matter clear

Return ONLY the markdown-formatted style guide, starting with a descriptive title based on the shared \
characteristics you identified."
    )
}

/// Merge a style guide with a subject. Plain templating, no model call.
pub fn composed_prompt_text(style_guide: &str, user_prompt: &str) -> String {
    format!(
        "{subject}\n\n\
Depict the subject above following the style guide below. Treat every section of the guide as a \
binding stylistic constraint while keeping the subject clearly recognisable.\n\n\
{guide}",
        subject = user_prompt,
        guide = style_guide,
    )
}
