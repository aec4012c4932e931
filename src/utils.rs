use sha2::{Digest, Sha256};

/// 计算URL的哈希值
///
/// # Arguments
/// * `url` - 要计算哈希的URL字符串
///
/// # Returns
/// 返回64位的十六进制 SHA-256 字符串
///
/// # Examples
/// ```
/// use offline_cache::utils::hash_url;
///
/// let hash = hash_url("https://example.com/index.html");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage key for a cached document: `<namespace>entry:<sha256(url)>`.
pub fn entry_key(namespace: &str, url: &str) -> String {
    format!("{}entry:{}", namespace, hash_url(url))
}

/// Storage key of the size/age index.
pub fn index_key(namespace: &str) -> String {
    format!("{}index", namespace)
}

/// Namespaces must be non-empty and end with `:` so one namespace can never
/// be a bare prefix of another's keys.
pub fn is_valid_namespace(namespace: &str) -> bool {
    namespace.len() > 1 && namespace.ends_with(':')
}

/// True only for keys this namespace itself writes: its index key and
/// `entry:` keys carrying a SHA-256 hex digest.
pub fn is_owned_key(namespace: &str, key: &str) -> bool {
    let rest = match key.strip_prefix(namespace) {
        Some(rest) => rest,
        None => return false,
    };
    if rest == "index" {
        return true;
    }
    match rest.strip_prefix("entry:") {
        Some(digest) => digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// 检查URL是否为绝对的 http(s) URL
pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
