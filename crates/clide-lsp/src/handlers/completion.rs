//! Completion requests.

use clide_session::{Completion, CompletionKind};
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tracing::debug;

use crate::state::ServerState;

use super::lsp_utils::{session_position, utf16_to_byte};
use super::report_error;

pub async fn completion(
    client: &Client,
    state: &ServerState,
    params: CompletionParams,
) -> Option<CompletionResponse> {
    let uri = params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;

    let workspace = state.workspace()?;
    let Some(doc) = state.get_document(&uri) else {
        debug!("Completion for unknown document: {}", uri);
        return None;
    };
    let line_text = doc.text.line(position.line.checked_add(1)?)?;
    let Some((line, column)) = session_position(line_text, position) else {
        debug!("Completion position {:?} is outside {}", position, uri);
        return None;
    };

    let triggered = params
        .context
        .as_ref()
        .is_some_and(|context| context.trigger_kind == CompletionTriggerKind::TRIGGER_CHARACTER);
    if triggered {
        let cursor = utf16_to_byte(line_text, position.character)?;
        if !workspace.trigger.should_complete(&line_text[..cursor]) {
            return None;
        }
    }

    let path = doc.path;
    let text = doc.text;
    let result = state
        .run_session(move |sessions| sessions.find_completions(&path, line, column, text))
        .await;
    match result {
        Ok(items) => Some(CompletionResponse::List(CompletionList {
            is_incomplete: false,
            items: items.iter().enumerate().map(completion_item).collect(),
        })),
        Err(err) => {
            report_error(client, "completion", &err).await;
            Some(CompletionResponse::Array(Vec::new()))
        }
    }
}

fn completion_item((index, completion): (usize, &Completion)) -> CompletionItem {
    let (insert_text, has_placeholders) = to_snippet(&completion.insert_text);
    let name = completion
        .label
        .split('(')
        .next()
        .unwrap_or(&completion.label);
    CompletionItem {
        label: completion.label.clone(),
        kind: Some(lsp_kind(completion)),
        detail: (!completion.detail.is_empty()).then(|| completion.detail.clone()),
        sort_text: Some(format!("{index:05}")),
        filter_text: (name != completion.label).then(|| name.to_string()),
        insert_text: Some(insert_text),
        insert_text_format: Some(if has_placeholders {
            InsertTextFormat::SNIPPET
        } else {
            InsertTextFormat::PLAIN_TEXT
        }),
        ..Default::default()
    }
}

fn lsp_kind(completion: &Completion) -> CompletionItemKind {
    match completion.kind {
        CompletionKind::Type => CompletionItemKind::CLASS,
        CompletionKind::Function => CompletionItemKind::FUNCTION,
        CompletionKind::Member if completion.label.contains('(') => CompletionItemKind::METHOD,
        CompletionKind::Member => CompletionItemKind::FIELD,
        CompletionKind::Variable | CompletionKind::Parameter => CompletionItemKind::VARIABLE,
        CompletionKind::TypeParameter => CompletionItemKind::TYPE_PARAMETER,
        CompletionKind::Macro => CompletionItemKind::CONSTANT,
        CompletionKind::Directive | CompletionKind::Keyword => CompletionItemKind::KEYWORD,
        CompletionKind::Other => CompletionItemKind::TEXT,
    }
}

/// Rewrites `<#slot#>` placeholders as numbered snippet tabstops.
///
/// Returns the text unchanged when it has no placeholders.
fn to_snippet(insert_text: &str) -> (String, bool) {
    if !insert_text.contains("<#") {
        return (insert_text.to_string(), false);
    }
    let mut snippet = String::with_capacity(insert_text.len() + 8);
    let mut rest = insert_text;
    let mut tabstop = 0;
    while let Some(open) = rest.find("<#") {
        let Some(close) = rest[open + 2..].find("#>") else {
            break;
        };
        tabstop += 1;
        escape_snippet(&rest[..open], &mut snippet);
        snippet.push_str(&format!("${{{tabstop}:"));
        escape_snippet(&rest[open + 2..open + 2 + close], &mut snippet);
        snippet.push('}');
        rest = &rest[open + 2 + close + 2..];
    }
    escape_snippet(rest, &mut snippet);
    (snippet, tabstop > 0)
}

fn escape_snippet(text: &str, out: &mut String) {
    for ch in text.chars() {
        if matches!(ch, '$' | '}' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
}
