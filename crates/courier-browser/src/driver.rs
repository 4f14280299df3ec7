//! Page-level driver on top of the CDP transport.
//!
//! Wraps a [`CdpConnection`] with the operations the bridge session needs:
//! navigation, JavaScript evaluation with exception surfacing, selector
//! probes, synthesized clicks and an Enter keypress.

use std::time::Duration;

use serde_json::Value;

use crate::cdp::CdpConnection;
use crate::error::BrowserError;

/// CDP DOM node handle. Zero means "no match".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub i64);

pub struct PageDriver {
    conn: CdpConnection,
}

/// Embed a Rust string as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
    // serde_json escaping is valid JS string syntax.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Center of an 8-value content quad `[x1,y1, .. x4,y4]`.
pub fn quad_center(quad: &[f64]) -> Option<(f64, f64)> {
    if quad.len() < 8 {
        return None;
    }
    let xs: Vec<f64> = quad.iter().step_by(2).copied().collect();
    let ys: Vec<f64> = quad.iter().skip(1).step_by(2).copied().collect();
    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
}

impl PageDriver {
    /// Connect to a page target and enable the domains we drive.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let conn = CdpConnection::connect(ws_url).await?;
        conn.enable("Page").await?;
        conn.enable("DOM").await?;
        conn.enable("Runtime").await?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &CdpConnection {
        &self.conn
    }

    /// Navigate; a load-level failure (DNS, refused) surfaces as an error.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let result = self
            .conn
            .call("Page.navigate", serde_json::json!({ "url": url }))
            .await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            return Err(BrowserError::NavigationFailed {
                reason: error_text.to_string(),
            });
        }
        Ok(())
    }

    /// Wait for `Page.loadEventFired`, consuming other events meanwhile.
    pub async fn wait_until_loaded(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(BrowserError::PageLoadTimeout { duration: timeout });
            }
            match tokio::time::timeout(remaining, self.conn.next_event()).await {
                Ok(Some(event)) if event.method == "Page.loadEventFired" => return Ok(()),
                Ok(Some(_)) => continue,
                Ok(None) => {
                    return Err(BrowserError::Protocol {
                        detail: "WebSocket closed while waiting for page load".to_string(),
                    })
                }
                Err(_) => return Err(BrowserError::PageLoadTimeout { duration: timeout }),
            }
        }
    }

    /// Evaluate an expression in page context. Promises are awaited; a
    /// thrown exception comes back as [`BrowserError::JsException`].
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .conn
            .call(
                "Runtime.evaluate",
                serde_json::json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Whether any element matches the selector.
    pub async fn element_exists(&self, selector: &str) -> Result<bool, BrowserError> {
        let expr = format!("!!document.querySelector({})", js_string(selector));
        Ok(self.evaluate(&expr).await?.as_bool().unwrap_or(false))
    }

    /// How many elements match the selector.
    pub async fn count_matches(&self, selector: &str) -> Result<usize, BrowserError> {
        let expr = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        let n = self.evaluate(&expr).await?.as_u64().unwrap_or(0);
        Ok(n as usize)
    }

    /// `innerText` of the last element matching the selector, if any.
    pub async fn last_inner_text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let expr = format!(
            "(() => {{ const m = document.querySelectorAll({}); \
             return m.length ? m[m.length - 1].innerText : null; }})()",
            js_string(selector)
        );
        Ok(self
            .evaluate(&expr)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }

    async fn document_root(&self) -> Result<i64, BrowserError> {
        let result = self
            .conn
            .call("DOM.getDocument", serde_json::json!({}))
            .await?;
        result
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(Value::as_i64)
            .ok_or_else(|| BrowserError::Protocol {
                detail: "DOM.getDocument returned no root nodeId".to_string(),
            })
    }

    /// Resolve a selector to a node handle, `None` if nothing matches.
    pub async fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, BrowserError> {
        let root = self.document_root().await?;
        let result = self
            .conn
            .call(
                "DOM.querySelector",
                serde_json::json!({ "nodeId": root, "selector": selector }),
            )
            .await?;
        let node_id = result.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
        Ok((node_id != 0).then_some(NodeId(node_id)))
    }

    /// Click the center of the element matching the selector.
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let node = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        let result = self
            .conn
            .call("DOM.getBoxModel", serde_json::json!({ "nodeId": node.0 }))
            .await?;
        let quad: Vec<f64> = result
            .get("model")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();
        let (cx, cy) = quad_center(&quad).ok_or_else(|| BrowserError::Protocol {
            detail: "DOM.getBoxModel returned no usable content quad".to_string(),
        })?;

        for event_type in ["mousePressed", "mouseReleased"] {
            self.conn
                .call(
                    "Input.dispatchMouseEvent",
                    serde_json::json!({
                        "type": event_type,
                        "x": cx,
                        "y": cy,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Synthesize an Enter keypress on the focused element.
    pub async fn press_enter(&self) -> Result<(), BrowserError> {
        for event_type in ["rawKeyDown", "char", "keyUp"] {
            let mut params = serde_json::json!({
                "type": event_type,
                "key": "Enter",
                "code": "Enter",
                "windowsVirtualKeyCode": 13,
                "nativeVirtualKeyCode": 13,
            });
            if event_type == "char" {
                params["text"] = Value::String("\r".to_string());
            }
            self.conn.call("Input.dispatchKeyEvent", params).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes_and_newlines() {
        assert_eq!(js_string("plain"), r#""plain""#);
        assert_eq!(js_string(r#"a "b" c"#), r#""a \"b\" c""#);
        assert_eq!(js_string("line1\nline2"), r#""line1\nline2""#);
    }

    #[test]
    fn js_string_survives_selector_syntax() {
        let sel = r#"div[data-message-author-role="assistant"]"#;
        let embedded = js_string(sel);
        assert!(embedded.starts_with('"') && embedded.ends_with('"'));
        assert!(embedded.contains(r#"\"assistant\""#));
    }

    #[test]
    fn quad_center_of_axis_aligned_box() {
        let quad = [10.0, 20.0, 110.0, 20.0, 110.0, 70.0, 10.0, 70.0];
        let (cx, cy) = quad_center(&quad).unwrap();
        assert!((cx - 60.0).abs() < 0.001);
        assert!((cy - 45.0).abs() < 0.001);
    }

    #[test]
    fn quad_center_rejects_short_quads() {
        assert!(quad_center(&[]).is_none());
        assert!(quad_center(&[1.0, 2.0, 3.0, 4.0]).is_none());
    }

    #[test]
    fn exception_details_extraction() {
        let result = serde_json::json!({
            "result": {"type": "object", "subtype": "error"},
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "TypeError: x is not a function"}
            }
        });
        let msg = result["exceptionDetails"]["exception"]["description"]
            .as_str()
            .unwrap();
        assert_eq!(msg, "TypeError: x is not a function");
    }
}
