//! Terminal output for chat turns.

use std::io::{self, Stdout, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::chat::session::{TurnId, TurnObserver, TurnOutcome};
use crate::error::Error;
use crate::types::{
    ChatEvent, ChatEventType, ChatTurnRequest, InterruptEvent, InterruptOption, MessageChunk,
    ToolCallResult, ToolCallsEvent,
};

/// ANSI escape code for dim text (used for agent names and reasoning).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for reasoning).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for tool names).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for tool arguments and interrupts).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for tool results).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Tool results longer than this are cut when displayed.
const MAX_RESULT_CHARS: usize = 200;

struct Output<W> {
    out: W,
    use_color: bool,
    in_reasoning: bool,
    line_start: bool,
    agent: Option<String>,
    interrupt_options: Vec<InterruptOption>,
}

impl<W: Write> Output<W> {
    fn print(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn styled(&mut self, styles: &[&str], text: &str) {
        if self.use_color {
            let styled = format!("{}{text}{ANSI_RESET}", styles.concat());
            let _ = self.out.write_all(styled.as_bytes());
            let _ = self.out.flush();
            self.line_start = text.ends_with('\n');
        } else {
            self.print(text);
        }
    }

    fn newline(&mut self) {
        if !self.line_start {
            self.print("\n");
        }
    }

    fn leave_reasoning(&mut self) {
        if self.in_reasoning {
            self.in_reasoning = false;
            self.newline();
        }
    }

    fn message_chunk(&mut self, chunk: MessageChunk) {
        if let Some(agent) = chunk.agent.filter(|agent| self.agent.as_ref() != Some(agent)) {
            self.newline();
            self.styled(&[ANSI_DIM], &format!("[{agent}]\n"));
            self.agent = Some(agent);
        }
        if let Some(reasoning) = chunk.reasoning_content.filter(|r| !r.is_empty()) {
            self.in_reasoning = true;
            self.styled(&[ANSI_DIM, ANSI_ITALIC], &reasoning);
        }
        if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
            self.leave_reasoning();
            self.print(&content);
        }
        if chunk.finish_reason.is_some() {
            self.leave_reasoning();
            self.newline();
        }
    }

    fn tool_calls(&mut self, event: ToolCallsEvent) {
        self.leave_reasoning();
        for call in event.tool_calls {
            self.newline();
            self.styled(&[ANSI_CYAN], &format!("-> {}", call.name));
            if !call.args.is_null() {
                self.print(" ");
                self.styled(&[ANSI_YELLOW], &call.args.to_string());
            }
            self.print("\n");
        }
    }

    fn tool_call_result(&mut self, result: ToolCallResult) {
        let content = match result.content {
            Value::String(text) => text,
            other => other.to_string(),
        };
        let mut shown: String = content.chars().take(MAX_RESULT_CHARS).collect();
        if shown.len() < content.len() {
            shown.push_str("...");
        }
        self.newline();
        self.styled(&[ANSI_GREEN], &format!("<- {}\n", shown.replace('\n', " ")));
    }

    fn interrupt(&mut self, question: Option<String>, options: Vec<InterruptOption>) {
        self.leave_reasoning();
        self.newline();
        if let Some(question) = question.filter(|q| !q.is_empty()) {
            self.styled(&[ANSI_YELLOW], &format!("{question}\n"));
        }
        for (index, option) in options.iter().enumerate() {
            self.styled(
                &[ANSI_YELLOW],
                &format!("  {}. {} ({})\n", index + 1, option.text, option.value),
            );
        }
        if !options.is_empty() {
            self.print("Answer with /feedback <n>, then send a message.\n");
        }
        self.interrupt_options = options;
    }

    fn error(&mut self, message: &str) {
        self.leave_reasoning();
        self.newline();
        self.styled(&[ANSI_RED], &format!("error: {message}\n"));
    }
}

/// Writes turn progress as plain text, with optional ANSI styling.
///
/// The options of the most recent interrupt are kept so a front end can resolve `/feedback 2`.
pub struct PlainTextObserver<W: Write + Send = Stdout> {
    output: Mutex<Output<W>>,
}

impl PlainTextObserver<Stdout> {
    /// Creates an observer that writes to stdout.
    pub fn new(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextObserver<W> {
    /// Creates an observer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            output: Mutex::new(Output {
                out,
                use_color,
                in_reasoning: false,
                line_start: true,
                agent: None,
                interrupt_options: Vec::new(),
            }),
        }
    }

    /// Options offered by the last interrupt of the last turn.
    pub fn interrupt_options(&self) -> Vec<InterruptOption> {
        self.lock().interrupt_options.clone()
    }

    /// Resolve a `/feedback` argument: a 1-based option number, an option value, or a free-form
    /// value.
    pub fn resolve_feedback(&self, answer: &str) -> InterruptOption {
        let output = self.lock();
        let options = &output.interrupt_options;
        if let Ok(number) = answer.parse::<usize>() {
            if let Some(option) = number.checked_sub(1).and_then(|index| options.get(index)) {
                return option.clone();
            }
        }
        options
            .iter()
            .find(|option| option.value == answer)
            .cloned()
            .unwrap_or_else(|| InterruptOption::new(answer, answer))
    }

    /// Consumes the observer, returning the writer.
    pub fn into_inner(self) -> W {
        self.output
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }

    fn lock(&self) -> MutexGuard<'_, Output<W>> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> TurnObserver for PlainTextObserver<W> {
    fn on_start(&self, turn: TurnId, request: &ChatTurnRequest) {
        let mut output = self.lock();
        output.agent = None;
        output.in_reasoning = false;
        output.interrupt_options.clear();
        tracing::debug!(turn = %turn, thread = %request.thread_id, "turn started");
    }

    fn on_event(&self, turn: TurnId, event: &ChatEvent) {
        let mut output = self.lock();
        let decoded = match &event.event_type {
            ChatEventType::MessageChunk => event
                .decode::<MessageChunk>()
                .map(|chunk| output.message_chunk(chunk)),
            ChatEventType::ToolCalls => event
                .decode::<ToolCallsEvent>()
                .map(|calls| output.tool_calls(calls)),
            ChatEventType::ToolCallResult => event
                .decode::<ToolCallResult>()
                .map(|result| output.tool_call_result(result)),
            ChatEventType::Interrupt => event
                .decode::<InterruptEvent>()
                .map(|interrupt| output.interrupt(interrupt.content, interrupt.options)),
            ChatEventType::Error => {
                let message = match event.data.get("error").or_else(|| event.data.get("message")) {
                    Some(Value::String(message)) => message.clone(),
                    _ => event.data.to_string(),
                };
                output.error(&message);
                Ok(())
            }
            ChatEventType::ToolCallChunks | ChatEventType::Other(_) => Ok(()),
        };
        if let Err(err) = decoded {
            tracing::debug!(
                turn = %turn,
                event = %event.event_type,
                error = %err,
                "skipping undisplayable event"
            );
        }
    }

    fn on_error(&self, _: TurnId, error: &Error) {
        self.lock().error(&error.to_string());
    }

    fn on_finish(&self, _: TurnId, outcome: &TurnOutcome) {
        let mut output = self.lock();
        output.leave_reasoning();
        if outcome.is_cancelled() {
            output.newline();
            output.styled(&[ANSI_DIM], "[cancelled]\n");
        }
        output.newline();
    }
}
