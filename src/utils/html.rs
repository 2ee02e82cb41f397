use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Quiz descriptions, instructions and question prompts arrive from the
/// authoring UI as rich text; this strips script/iframe tags and event
/// handler attributes while keeping basic formatting, so stored content is
/// safe to render in any client.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
