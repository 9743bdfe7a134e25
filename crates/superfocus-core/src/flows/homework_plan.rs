//! Turning a list of homework tasks into a paced study plan.

use std::fmt::Write as _;

use tracing::{debug, info};

use crate::contracts::{HomeworkPlanRequest, HomeworkPlanResponse, HomeworkTask, PlanEntry};
use crate::error::{FocusError, Result};
use crate::generation::{generate_structured, ChatMessage, ChatModel, StructuredOutput};
use crate::validate::Validate;

use super::TUTOR_PREAMBLE;

const INSTRUCTIONS: &str = "Build a homework plan. Return exactly one plan entry per task, \
in the same order the tasks are listed, keeping each task's subject and topic. \
Suggest realistic minutes for each task and add one short sentence of encouragement per entry. \
Finish with a friendly summary addressed to the student by name.";

/// Renders the task list the model sees.
pub fn build_prompt(request: &HomeworkPlanRequest) -> String {
    let mut prompt = format!(
        "Student: {}\nTasks ({}):",
        request.student_name.trim(),
        request.tasks.len()
    );
    for (i, task) in request.tasks.iter().enumerate() {
        let _ = write!(
            prompt,
            "\n{}. {} - {} (about {} minutes)",
            i + 1,
            task.subject.trim(),
            task.topic.trim(),
            task.estimated_minutes
        );
    }
    prompt
}

/// Builds the conversation for a planning request.
pub fn build_messages(request: &HomeworkPlanRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!("{TUTOR_PREAMBLE}\n\n{INSTRUCTIONS}")),
        ChatMessage::user(build_prompt(request)),
    ]
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// For each task, the index of the one entry whose key equals the task's.
/// `None` unless the pairing is one-to-one.
fn pair_by<K: PartialEq>(
    tasks: &[HomeworkTask],
    entries: &[PlanEntry],
    task_key: impl Fn(&HomeworkTask) -> K,
    entry_key: impl Fn(&PlanEntry) -> K,
) -> Option<Vec<usize>> {
    let entry_keys: Vec<K> = entries.iter().map(entry_key).collect();
    let mut used = vec![false; entries.len()];
    let mut order = Vec::with_capacity(tasks.len());
    for task in tasks {
        let key = task_key(task);
        let mut matches = entry_keys
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == key)
            .map(|(i, _)| i);
        let (Some(index), None) = (matches.next(), matches.next()) else {
            return None;
        };
        if used[index] {
            return None;
        }
        used[index] = true;
        order.push(index);
    }
    Some(order)
}

/// Puts the model's entries back into task order.
///
/// Entries are paired with tasks by subject and topic, then by subject
/// alone, ignoring case and surrounding whitespace. Position is used only
/// when neither pairing is one-to-one.
fn align_entries(tasks: &[HomeworkTask], entries: Vec<PlanEntry>) -> Vec<PlanEntry> {
    let order = pair_by(
        tasks,
        &entries,
        |t| (normalize(&t.subject), normalize(&t.topic)),
        |e| (normalize(&e.subject), normalize(&e.topic)),
    )
    .or_else(|| {
        pair_by(
            tasks,
            &entries,
            |t| normalize(&t.subject),
            |e| normalize(&e.subject),
        )
    });

    let Some(order) = order else {
        debug!("Plan entries could not be paired by name; keeping model order");
        return entries;
    };
    let mut slots: Vec<Option<PlanEntry>> = entries.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

/// Generates a plan with one entry per task, in task order.
///
/// Subject and topic of each entry come from the request so the plan always
/// lines up with what the student entered.
pub async fn homework_plan(
    model: &dyn ChatModel,
    request: &HomeworkPlanRequest,
) -> Result<HomeworkPlanResponse> {
    request.validate()?;

    let mut response: HomeworkPlanResponse =
        generate_structured(model, build_messages(request)).await?;

    if response.plan.len() != request.tasks.len() {
        return Err(FocusError::schema_mismatch(
            HomeworkPlanResponse::NAME,
            format!(
                "expected {} plan entries, got {}",
                request.tasks.len(),
                response.plan.len()
            ),
        ));
    }

    response.plan = align_entries(&request.tasks, std::mem::take(&mut response.plan));
    for (entry, task) in response.plan.iter_mut().zip(&request.tasks) {
        entry.subject.clone_from(&task.subject);
        entry.topic.clone_from(&task.topic);
        if entry.minutes == 0 {
            entry.minutes = task.estimated_minutes;
        }
    }

    info!(
        tasks = request.tasks.len(),
        total_minutes = response.plan.iter().map(|e| e.minutes).sum::<u32>(),
        "Homework plan generated"
    );
    Ok(response)
}
