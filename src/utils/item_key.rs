/// Key name without parameters: `icmpping[,3]` -> `icmpping`.
pub fn key_name(key: &str) -> &str {
    match key.find('[') {
        Some(pos) => &key[..pos],
        None => key,
    }
}

/// Simple checks served by the pinger.
pub fn is_icmpping(key: &str) -> bool {
    matches!(key_name(key), "icmpping" | "icmppingloss" | "icmppingsec")
}
