/// Output destination for record sinks
#[derive(Debug, Clone)]
pub struct Output {
    pub directory: String,
    /// `csv`, `json` or `sqlite`
    pub format: String,
}

impl Output {
    pub fn new(directory: &str, format: &str) -> Output {
        Output {
            directory: directory.to_string(),
            format: format.to_string(),
        }
    }
}
