//! Integration tests for the anaflow library.
//!
//! These tests drive the real HTTP client against a local server that speaks just enough
//! HTTP/1.1 to answer one request per connection.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    use anaflow::chat::{SendOptions, SessionController, TurnOutcome};
    use anaflow::{
        AnaFlow, AppContext, ChatEventType, ChatTurnRequest, ConfigLoader, InterruptOption,
        MemoryStorage, PlanningLimits, RuntimeConfig, SettingsStore, TurnFlags,
    };

    /// What the server saw.
    #[derive(Debug)]
    struct Captured {
        request_line: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }

        fn json(&self) -> Value {
            serde_json::from_str(&self.body).expect("request body should be JSON")
        }
    }

    /// How the server answers.
    enum Reply {
        /// Write each part, pausing between them, then close.
        Parts { head: String, parts: Vec<String> },
        /// Write the head and the parts, then keep the connection open.
        Stall { head: String, parts: Vec<String> },
    }

    fn sse(parts: &[&str]) -> Reply {
        Reply::Parts {
            head: concat!(
                "HTTP/1.1 200 OK\r\n",
                "Content-Type: text/event-stream\r\n",
                "Cache-Control: no-cache\r\n",
                "Connection: close\r\n\r\n",
            )
            .to_string(),
            parts: parts.iter().map(|part| part.to_string()).collect(),
        }
    }

    fn json_reply(status: &str, body: &str) -> Reply {
        Reply::Parts {
            head: format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            ),
            parts: vec![body.to_string()],
        }
    }

    async fn read_request(socket: &mut TcpStream) -> Captured {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.expect("read request");
            assert!(n > 0, "client closed before sending a request");
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };
        let head = String::from_utf8(buffer[..head_end].to_vec()).expect("ascii head");
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        let content_length = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = buffer[head_end + 4..].to_vec();
        while body.len() < content_length {
            let n = socket.read(&mut chunk).await.expect("read body");
            assert!(n > 0, "client closed mid-body");
            body.extend_from_slice(&chunk[..n]);
        }
        Captured {
            request_line,
            headers,
            body: String::from_utf8(body).expect("utf-8 body"),
        }
    }

    /// Serve one connection on an ephemeral port.  Returns the base URL and the captured request.
    async fn serve_once(reply: Reply) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let captured = read_request(&mut socket).await;
            let (head, parts, stall) = match reply {
                Reply::Parts { head, parts } => (head, parts, false),
                Reply::Stall { head, parts } => (head, parts, true),
            };
            socket.write_all(head.as_bytes()).await.expect("write head");
            for part in parts {
                socket.write_all(part.as_bytes()).await.expect("write part");
                socket.flush().await.expect("flush");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            if stall {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            let _ = socket.shutdown().await;
            captured
        });
        (format!("http://{addr}/api/"), handle)
    }

    fn request(message: &str) -> ChatTurnRequest {
        ChatTurnRequest {
            message: message.to_string(),
            thread_id: "thread-42".to_string(),
            resources: Vec::new(),
            planning_limits: PlanningLimits {
                max_plan_iterations: 1,
                max_step_num: 3,
                max_search_results: Some(3),
            },
            flags: TurnFlags::default(),
            report_style: None,
            interrupt_feedback: None,
            mcp_settings: None,
        }
    }

    #[tokio::test]
    async fn chat_stream_posts_turn_and_decodes_events() {
        let (base_url, server) = serve_once(sse(&[
            "event: message_chunk\ndata: {\"agent\":\"planner\",\"content\":\"Hel",
            "lo\"}\n\n",
            ": keep-alive\n\nevent: plan_updated\ndata: {\"step\":1}\n\n",
        ]))
        .await;
        let client = AnaFlow::new(Some(base_url)).unwrap();

        let events: Vec<_> = client
            .chat_stream(&request("What is MCP?"), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        let first = events[0].as_ref().unwrap();
        assert_eq!(first.event_type, ChatEventType::MessageChunk);
        let chunk = first.message_chunk().unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("Hello"));
        assert_eq!(chunk.agent.as_deref(), Some("planner"));
        let second = events[1].as_ref().unwrap();
        assert_eq!(
            second.event_type,
            ChatEventType::Other("plan_updated".to_string())
        );

        let captured = server.await.unwrap();
        assert_eq!(captured.request_line, "POST /api/chat/stream HTTP/1.1");
        assert_eq!(captured.header("accept"), Some("text/event-stream"));
        let body = captured.json();
        assert_eq!(body["messages"], json!([{"role": "user", "content": "What is MCP?"}]));
        assert_eq!(body["thread_id"], "thread-42");
        assert_eq!(body["max_search_results"], 3);
        assert!(body.get("resources").is_none());
        assert!(body.get("interrupt_feedback").is_none());
        assert!(body.get("mcp_settings").is_none());
    }

    #[tokio::test]
    async fn chat_stream_is_lazy() {
        let (base_url, server) = serve_once(sse(&["data: {}\n\n"])).await;
        let client = AnaFlow::new(Some(base_url)).unwrap();
        let stream = client.chat_stream(&request("hi"), CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished());
        drop(stream);
        server.abort();
    }

    #[tokio::test]
    async fn error_status_ends_stream() {
        let (base_url, server) =
            serve_once(json_reply("500 Internal Server Error", "{\"detail\":\"boom\"}")).await;
        let client = AnaFlow::new(Some(base_url)).unwrap();

        let mut stream = client.chat_stream(&request("hi"), CancellationToken::new());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(!err.is_cancelled());
        assert!(stream.next().await.is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_mid_stream() {
        let (base_url, server) = serve_once(Reply::Stall {
            head: "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n"
                .to_string(),
            parts: vec!["event: message_chunk\ndata: {\"content\":\"partial\"}\n\n".to_string()],
        })
        .await;
        let client = AnaFlow::new(Some(base_url)).unwrap();
        let cancel = CancellationToken::new();

        let mut stream = client.chat_stream(&request("hi"), cancel.clone());
        assert!(stream.next().await.unwrap().is_ok());
        cancel.cancel();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(stream.next().await.is_none());
        server.abort();
    }

    #[tokio::test]
    async fn config_is_fetched_once() {
        let (base_url, server) = serve_once(json_reply(
            "200 OK",
            r#"{"rag":{"provider":"ragflow"},"models":{"basic":["doubao-1.5-pro"],"reasoning":["deepseek-r1"]}}"#,
        ))
        .await;
        let client = AnaFlow::new(Some(base_url)).unwrap();
        let loader = ConfigLoader::new();

        let config = loader.load(&client).await;
        assert_eq!(config.rag_provider(), "ragflow");
        assert_eq!(config.models.reasoning, vec!["deepseek-r1".to_string()]);
        // The server is gone; a second load must not fetch.
        assert_eq!(loader.load(&client).await.rag_provider(), "ragflow");

        let captured = server.await.unwrap();
        assert_eq!(captured.request_line, "GET /api/config HTTP/1.1");
    }

    #[tokio::test]
    async fn unreachable_config_falls_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AnaFlow::new(Some(format!("http://{addr}/api"))).unwrap();
        let err = client.fetch_config().await.unwrap_err();
        assert!(err.is_network());

        let context = AppContext::new(Arc::new(MemoryStorage::new()));
        assert_eq!(context.init(&client).await, &RuntimeConfig::fallback());
        assert!(context.is_initialized());
    }

    #[tokio::test]
    async fn malformed_config_falls_back() {
        let (base_url, server) = serve_once(json_reply("200 OK", "<html>oops</html>")).await;
        let client = AnaFlow::new(Some(base_url)).unwrap();
        let loader = ConfigLoader::new();
        assert_eq!(loader.load(&client).await, &RuntimeConfig::fallback());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn session_turn_end_to_end() {
        let (base_url, server) = serve_once(sse(&[
            "event: interrupt\ndata: {\"content\":\"Review the plan\",\"options\":[{\"text\":\"Start research\",\"value\":\"accepted\"}]}\n\n",
            "event: message_chunk\ndata: {\"content\":\"ok\",\"finish_reason\":\"stop\"}\n\n",
        ]))
        .await;
        let client = AnaFlow::new(Some(base_url)).unwrap();
        let settings = SettingsStore::load(Arc::new(MemoryStorage::new())).shared();
        let controller = SessionController::new(client, settings, "thread-e2e");
        controller.set_feedback(InterruptOption::new("Start research", "accepted"));

        let outcome = controller.send("Go ahead", SendOptions::default()).await;
        assert!(matches!(outcome, TurnOutcome::Completed { events: 2 }));
        assert_eq!(controller.current_turn(), None);

        let body = server.await.unwrap().json();
        assert_eq!(body["thread_id"], "thread-e2e");
        assert_eq!(body["interrupt_feedback"], "accepted");
        assert_eq!(body["report_style"], "academic");
        assert_eq!(body["enable_deep_thinking"], false);
        let servers = body["mcp_settings"]["servers"].as_object().unwrap();
        assert_eq!(
            servers.keys().collect::<Vec<_>>(),
            vec!["Filesystem", "Web Search"]
        );
        assert_eq!(servers["Web Search"]["transport"], "stdio");
        assert_eq!(
            servers["Web Search"]["enabled_tools"],
            json!(["tavily_search_results_json"])
        );
        assert_eq!(servers["Filesystem"]["add_to_agents"], json!(["researcher"]));
    }
}
