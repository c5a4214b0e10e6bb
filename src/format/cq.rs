// src/format/cq.rs
//! OneBot CQ-code helpers.

/// Escape plain text so it is not parsed as CQ codes.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
}

/// Escape a CQ-code parameter value (commas separate parameters).
pub fn escape_param(s: &str) -> String {
    escape(s).replace(',', "&#44;")
}

pub fn img(url: &str) -> String {
    format!("[CQ:image,file={}]", escape_param(url))
}

pub fn at_all() -> &'static str {
    "[CQ:at,qq=all]"
}

pub fn reply(message_id: i64) -> String {
    format!("[CQ:reply,id={message_id}]")
}

/// Reverse of `escape_param`, for payloads pulled out of `[CQ:json,data=...]`.
pub fn unescape(s: &str) -> String {
    s.replace("&#44;", ",")
        .replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&amp;", "&")
}
