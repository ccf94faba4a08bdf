//! 会话指纹与幂等键推导
//!
//! 不使用 Cookie 或任何客户端持久标识，仅从请求元数据做单向推导。
//! 截断哈希用紧凑存储换取理论上的碰撞风险；幂等键按 1 秒取整，
//! 同一会话亚秒级的连点会合并为同一个键，这正是去重机制本身。

use sha2::{Digest, Sha256};

/// 指纹长度（十六进制字符数）
const FINGERPRINT_HEX_LEN: usize = 16;

/// 幂等键长度（十六进制字符数）
const IDEMPOTENCY_KEY_HEX_LEN: usize = 32;

/// 缺失 IP / UA 时的占位符
const ABSENT_PLACEHOLDER: &str = "unknown";

/// 推导会话指纹
///
/// 四个输入以 `|` 连接后做 SHA-256，取前 16 个十六进制字符。
/// IP 与 UA 缺失时替换为 "unknown"，两个请求头缺失时替换为空串。
/// 纯函数：相同输入恒产生相同输出。
pub fn derive_session_fingerprint(
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    accept_language: Option<&str>,
    accept_encoding: Option<&str>,
) -> String {
    let raw = [
        ip_address.unwrap_or(ABSENT_PLACEHOLDER),
        user_agent.unwrap_or(ABSENT_PLACEHOLDER),
        accept_language.unwrap_or(""),
        accept_encoding.unwrap_or(""),
    ]
    .join("|");

    let digest = Sha256::digest(raw.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}

/// 推导幂等键
///
/// `epoch_millis` 向下取整到秒，与 link_id、指纹以 `:` 连接后做
/// SHA-256，取前 32 个十六进制字符。同一 `(link_id, 指纹, 秒)` 的
/// 任意次调用产生同一个键，由存储层唯一索引裁决先后。
pub fn derive_idempotency_key(link_id: &str, fingerprint: &str, epoch_millis: i64) -> String {
    let floored_second = epoch_millis.div_euclid(1000);
    let raw = format!("{}:{}:{}", link_id, fingerprint, floored_second);

    let digest = Sha256::digest(raw.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(IDEMPOTENCY_KEY_HEX_LEN);
    hex
}
