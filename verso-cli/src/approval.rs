//! Interactive approval on stdin.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use verso::agent::{ApprovalRequest, ApprovalResponse};
use verso::ApprovalRegistry;

const PROMPT: &str = "[a]pprove, [r]eject, or g <feedback> to regenerate: ";

/// Parse one reviewer answer: `a`, `r [reason]`, or `g <feedback>`.
pub fn parse_answer(line: &str) -> Option<ApprovalResponse> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let response = match head.to_ascii_lowercase().as_str() {
        "a" | "approve" => ApprovalResponse::approve(),
        "r" | "reject" => ApprovalResponse::reject(),
        "g" | "regenerate" => return Some(ApprovalResponse::regenerate(rest)),
        _ => return None,
    };
    Some(if rest.is_empty() {
        response
    } else {
        response.with_feedback(rest)
    })
}

/// Present each published request and resolve it from stdin.
///
/// Returns when the request channel closes or stdin ends; unanswered
/// requests then time out in the gate.
pub async fn prompt_loop(
    registry: ApprovalRegistry,
    mut requests: mpsc::UnboundedReceiver<ApprovalRequest>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(request) = requests.recv().await {
        let rendered = serde_json::to_string_pretty(&request.output)
            .unwrap_or_else(|_| request.output.to_string());
        eprintln!("\n--- {} produced ---\n{rendered}", request.tool_id);

        loop {
            eprint!("{PROMPT}");
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!("stdin closed, leaving approval requests unanswered");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read approval answer");
                    return;
                }
            };

            match parse_answer(&line) {
                Some(response) => {
                    if let Err(e) = registry.resolve(request.id, response) {
                        warn!(approval_id = %request.id, error = %e, "Approval answer not delivered");
                    }
                    break;
                }
                None => eprintln!("unrecognized answer '{}'", line.trim()),
            }
        }
    }
}
