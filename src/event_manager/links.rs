//! # 超链接
//!
//! 单个实体的响应都带 `_links`，地址是基于对外服务地址的绝对 URL。

use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

use crate::config::ServiceAddress;
use crate::error::{Result, TicketingError};

/// Event Manager 的 API 前缀
pub const API_PREFIX: &str = "/api/event-manager";

/// 单个链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
    pub method: &'static str,
}

/// `rel -> Link`
pub type Links = BTreeMap<&'static str, Link>;

/// 生成链接的工具，持有对外基础地址
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: Url,
}

impl LinkBuilder {
    pub fn new(public: &ServiceAddress) -> Result<Self> {
        let raw = format!("{}{API_PREFIX}/", public.base_url());
        let base = Url::parse(&raw).map_err(|e| {
            TicketingError::config_with_source(format!("invalid public address {raw:?}"), e)
        })?;
        Ok(Self { base })
    }

    fn href(&self, path: &str) -> String {
        self.base
            .join(path)
            .map_or_else(|_| format!("{}{path}", self.base), String::from)
    }

    fn link(&self, path: &str, method: &'static str) -> Link {
        Link {
            href: self.href(path),
            method,
        }
    }

    /// 可读、可改、可删的集合成员
    fn member(&self, path: &str, parent: &str) -> Links {
        let mut links = Links::new();
        links.insert("self", self.link(path, "GET"));
        links.insert("update", self.link(path, "PATCH"));
        links.insert("delete", self.link(path, "DELETE"));
        links.insert("parent", self.link(parent, "GET"));
        links
    }

    #[must_use]
    pub fn event(&self, event_id: i32) -> Links {
        let mut links = self.member(&format!("events/{event_id}"), "events");
        links.insert(
            "event_packets",
            self.link(&format!("events/{event_id}/event-packets"), "GET"),
        );
        links
    }

    #[must_use]
    pub fn packet(&self, packet_id: i32) -> Links {
        let mut links = self.member(&format!("event-packets/{packet_id}"), "event-packets");
        links.insert(
            "events",
            self.link(&format!("event-packets/{packet_id}/events"), "GET"),
        );
        links
    }

    #[must_use]
    pub fn inclusion(&self, event_id: i32, packet_id: i32) -> Links {
        let mut links = self.member(
            &format!("events/{event_id}/event-packets/{packet_id}"),
            &format!("events/{event_id}/event-packets"),
        );
        links.insert("event", self.link(&format!("events/{event_id}"), "GET"));
        links.insert(
            "event_packet",
            self.link(&format!("event-packets/{packet_id}"), "GET"),
        );
        links
    }

    #[must_use]
    pub fn ticket(&self, code: &str, event_id: Option<i32>, packet_id: Option<i32>) -> Links {
        let path = format!("tickets/{code}");
        let mut links = self.member(&path, "tickets");
        links.insert("replace", self.link(&path, "PUT"));
        if let Some(event_id) = event_id {
            links.insert("event", self.link(&format!("events/{event_id}"), "GET"));
        }
        if let Some(packet_id) = packet_id {
            links.insert(
                "event_packet",
                self.link(&format!("event-packets/{packet_id}"), "GET"),
            );
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builder() -> LinkBuilder {
        LinkBuilder::new(&ServiceAddress {
            host: "events.local".into(),
            port: 8080,
        })
        .unwrap()
    }

    #[test]
    fn event_links_are_absolute() {
        let links = builder().event(3);
        assert_eq!(
            links["self"].href,
            "http://events.local:8080/api/event-manager/events/3"
        );
        assert_eq!(links["update"].method, "PATCH");
        assert_eq!(
            links["parent"].href,
            "http://events.local:8080/api/event-manager/events"
        );
    }

    #[test]
    fn ticket_links_cross_reference_targets() {
        let links = builder().ticket("abc", None, Some(4));
        assert!(!links.contains_key("event"));
        assert_eq!(
            links["event_packet"].href,
            "http://events.local:8080/api/event-manager/event-packets/4"
        );
        assert_eq!(links["replace"].method, "PUT");
    }

    #[test]
    fn inclusion_links_point_at_both_sides() {
        let links = builder().inclusion(1, 2);
        assert_eq!(
            links["self"].href,
            "http://events.local:8080/api/event-manager/events/1/event-packets/2"
        );
        assert!(links.contains_key("event"));
        assert!(links.contains_key("event_packet"));
    }
}
