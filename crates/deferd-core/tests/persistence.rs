use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deferd_core::{
    CancelOutcome, CommandRunner, CoreError, EventKind, Outcome, RunOutput, RunnerError,
    Scheduler, SchedulerConfig, Subscribe, TaskEvent,
};
use deferd_model::{Task, TaskId, TaskRecord, TaskStatus};

struct EchoRunner;

#[async_trait]
impl CommandRunner for EchoRunner {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn run(&self, command_line: &str) -> Result<RunOutput, RunnerError> {
        Ok(RunOutput {
            stdout: format!("{command_line}\n"),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

async fn open(dir: &std::path::Path) -> Scheduler {
    let config = SchedulerConfig {
        data_dir: Some(dir.to_path_buf()),
        ..Default::default()
    };
    Scheduler::new(config, Arc::new(EchoRunner), Vec::new())
        .await
        .expect("scheduler should open")
}

#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

impl Subscribe for Recorder {
    fn on_event(&self, event: &TaskEvent) {
        self.kinds.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn read(path: std::path::PathBuf) -> Vec<TaskRecord> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn snapshot_and_history_follow_every_transition() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = open(dir.path()).await;

    let run = scheduler.submit(Task::new("echo hi", 1)).await.unwrap();
    let drop_me = scheduler.submit(Task::new("date", 5)).await.unwrap();

    let tasks = read(dir.path().join("tasks.json"));
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|r| r.status == TaskStatus::Scheduled));

    scheduler.cancel(drop_me.record.id.as_str()).await.unwrap();
    assert_eq!(run.handle.outcome().await.unwrap(), Outcome::Executed);

    let tasks = read(dir.path().join("tasks.json"));
    let status_of = |id: &TaskId| tasks.iter().find(|r| &r.id == id).unwrap().status;
    assert_eq!(status_of(&run.record.id), TaskStatus::Executed);
    assert_eq!(status_of(&drop_me.record.id), TaskStatus::Canceled);

    let history = read(dir.path().join("history.json"));
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, drop_me.record.id);
    assert_eq!(history[1].id, run.record.id);
    assert_eq!(history[1].stdout, "echo hi\n");
}

#[tokio::test]
async fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first_id = {
        let scheduler = open(dir.path()).await;
        let submission = scheduler.submit(Task::new("uptime", 1)).await.unwrap();
        submission.handle.outcome().await.unwrap();
        submission.record.id
    };

    let scheduler = open(dir.path()).await;
    let history = scheduler.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, first_id);
    assert_eq!(history[0].status, TaskStatus::Executed);

    // Active tasks are not restored; only history is.
    assert!(scheduler.list().is_empty());
}

#[tokio::test]
async fn scheduled_tasks_from_a_previous_run_are_not_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let stale = TaskRecord::scheduled(TaskId::from("Stale001"), Task::new("echo old", 1));
    std::fs::write(
        dir.path().join("tasks.json"),
        serde_json::to_vec(&vec![stale]).unwrap(),
    )
    .unwrap();

    let scheduler = open(dir.path()).await;
    assert!(scheduler.list().is_empty());
    assert!(scheduler.history().await.is_empty());
    assert_eq!(scheduler.in_flight(), 0);
}

#[tokio::test]
async fn corrupt_history_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.json"), "[{").unwrap();

    let config = SchedulerConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    assert!(
        Scheduler::new(config, Arc::new(EchoRunner), Vec::new())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn malformed_submission_is_written_to_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = open(dir.path()).await;

    let record = scheduler.record_malformed("unknown field `cmd`").await;

    let tasks = read(dir.path().join("tasks.json"));
    let history = read(dir.path().join("history.json"));
    assert_eq!(tasks, vec![record.clone()]);
    assert_eq!(history, vec![record]);
}

#[tokio::test]
async fn lost_data_dir_does_not_stop_execution() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    let recorder = Arc::new(Recorder::default());
    let config = SchedulerConfig {
        data_dir: Some(data.clone()),
        ..Default::default()
    };
    let scheduler = Scheduler::new(
        config,
        Arc::new(EchoRunner),
        vec![Arc::clone(&recorder) as Arc<dyn Subscribe>],
    )
    .await
    .unwrap();
    std::fs::remove_dir_all(&data).unwrap();

    let submission = scheduler.submit(Task::new("echo hi", 1)).await.unwrap();
    let id = submission.record.id.clone();
    assert_eq!(submission.handle.outcome().await.unwrap(), Outcome::Executed);

    assert_eq!(scheduler.get(id.as_str()).unwrap().status, TaskStatus::Executed);
    let history = scheduler.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, id);
    assert_eq!(scheduler.in_flight(), 0);

    let kinds = recorder.kinds.lock().unwrap().clone();
    assert!(kinds.contains(&EventKind::PersistFailed));
    assert!(kinds.contains(&EventKind::Executed));
    assert!(!data.exists());
}

#[tokio::test]
async fn finished_tasks_stay_addressable_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (ran, dropped) = {
        let scheduler = open(dir.path()).await;
        let ran = scheduler.submit(Task::new("whoami", 1)).await.unwrap();
        let dropped = scheduler.submit(Task::new("date", 5)).await.unwrap();
        scheduler.cancel(dropped.record.id.as_str()).await.unwrap();
        ran.handle.outcome().await.unwrap();
        (ran.record.id, dropped.record.id)
    };

    let scheduler = open(dir.path()).await;
    assert!(scheduler.get(ran.as_str()).is_none());

    let record = scheduler.lookup(ran.as_str()).await.unwrap();
    assert_eq!(record.status, TaskStatus::Executed);
    assert!(matches!(
        scheduler.cancel(ran.as_str()).await,
        Err(CoreError::AlreadyExecuted(ref id)) if id == &ran
    ));

    assert_eq!(
        scheduler.lookup(dropped.as_str()).await.unwrap().status,
        TaskStatus::Canceled
    );
    assert!(matches!(
        scheduler.cancel(dropped.as_str()).await.unwrap(),
        CancelOutcome::AlreadyCanceled(_)
    ));

    assert!(scheduler.lookup("Unknown1").await.is_none());
    assert!(matches!(
        scheduler.cancel("Unknown1").await,
        Err(CoreError::NotFound(_))
    ));
}
