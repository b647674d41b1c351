/// Normalize a module or friendly name into the form carried in an export's
/// `type` attribute and file name: every character that is not a letter or a
/// digit is dropped, case is kept.
pub fn clean_name(name: &str) -> String {
    name.chars().filter(|c| c.is_alphanumeric()).collect()
}
