//! Prompts sent to the AI gateway.

use crate::body_part::BodyPart;
use crate::config::AnalysisScope;

/// Body-part specific yes/no question asked before any analysis.
pub fn validation_question(part: BodyPart) -> &'static str {
    match part {
        BodyPart::Skin => "Is this image showing human skin? Look for skin surface, texture, pores, or skin tone on a body area. Return true only if you can clearly see skin.",
        BodyPart::Eyes => "Is this image showing a human eye? Look for iris, pupil, sclera, eyelid, or eyelashes. Return true only if you can clearly see an eye.",
        BodyPart::Tongue => "Is this image showing a human tongue? Look for tongue surface, papillae, or oral cavity. Return true only if you can clearly see a tongue.",
        BodyPart::Nails => "Is this image showing human nails? Look for nail plate, nail bed, or fingertips/toes. Return true only if you can clearly see nails.",
    }
}

/// Full validation text: the question plus the answer constraint.
pub fn validation_prompt(part: BodyPart) -> String {
    format!(
        "{} Answer with only 'yes' or 'no'.",
        validation_question(part)
    )
}

/// User-turn instruction for the analysis call.
pub fn analysis_instruction(part: BodyPart, scope: &AnalysisScope) -> String {
    let nutrients = scope.nutrients_for(part);
    format!(
        "Analyze this {} image ONLY for signs of deficiencies related to {}. Look for visible indicators specific to {} only.",
        part.image_noun(),
        join_nutrients(nutrients),
        if nutrients.len() == 1 { "this nutrient" } else { "these nutrients" },
    )
}

/// System message constraining output format and domain scope.
pub fn system_prompt(scope: &AnalysisScope) -> String {
    let mut prompt = String::from(
        "You are a medical nutrition specialist analyzing images strictly for nutritional deficiency detection.\n\nCRITICAL RULES:\n- ONLY analyze for deficiencies of the nutrients listed for the body part below\n- DO NOT mention or suggest any other health conditions, allergies, infections, hormonal problems, dehydration, or environmental factors\n",
    );
    if scope.vitamins_only() {
        prompt.push_str(
            "- DO NOT include minerals, proteins, or other nutrients unless they are vitamins\n",
        );
    }
    prompt.push_str(
        "- DO NOT describe what you see in the image (rashes, textures, colors, etc.)\n\nAdmissible nutrients per body part:\n",
    );
    for part in BodyPart::ALL {
        prompt.push_str(&format!(
            "- {}: {} only\n",
            part.label(),
            scope.nutrients_for(part).join(", ")
        ));
    }
    prompt.push_str(RESPONSE_FORMAT_RULES);
    prompt
}

const RESPONSE_FORMAT_RULES: &str = r#"
Be conservative - only flag deficiencies with clear visual indicators.

Return a JSON object with this exact structure:
{
  "deficiencies": [
    {
      "vitamin": "Vitamin A",
      "confidence": 85,
      "severity": "low" | "moderate" | "severe",
      "signs": ["Short factual sign"],
      "recommendations": ["Short dietary recommendation"],
      "description": "2-4 sentences on the health impact of this deficiency"
    }
  ],
  "overall_health": "Brief overall assessment"
}

IMPORTANT:
- You MUST include a "confidence" field (numeric value 0-100) for EVERY deficiency detected
- The confidence should reflect the clarity of visual indicators
- Return an empty "deficiencies" array when no deficiency is visible
- ONLY report on the nutrients specified for the body part"#;

fn join_nutrients(nutrients: &[String]) -> String {
    match nutrients {
        [] => "no nutrients".to_string(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
