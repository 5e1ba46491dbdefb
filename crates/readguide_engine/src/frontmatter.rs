use crate::Artifact;

/// Render a guide as markdown with a frontmatter header.
///
/// Header values are JSON-quoted so names and descriptions containing colons or
/// line breaks cannot break the header.
pub fn build_guide_document(artifact: &Artifact) -> String {
    let quote = |value: &str| serde_json::Value::from(value).to_string();
    let tags = serde_json::Value::from(artifact.classification.tags.clone()).to_string();
    let model = artifact.model.as_deref().unwrap_or("default");
    format!(
        "---\nsource: {source}\nprofile: {profile}\nmodel: {model}\ntags: {tags}\ndescription: {description}\ngenerated_utc: {generated}\n---\n\n{body}\n",
        source = quote(&artifact.source_name),
        profile = quote(&artifact.profile),
        model = quote(model),
        tags = tags,
        description = quote(&artifact.classification.description),
        generated = quote(&artifact.generated_utc),
        body = artifact.guide.trim_end(),
    )
}
