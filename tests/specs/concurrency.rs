//! Competing agents never share a job.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::prelude::*;

use ra_core::JobStatus;
use ra_storage::WorkItemStore;
use similar_asserts::assert_eq;

const AGENTS: usize = 16;

fn crowded_world(jobs: usize) -> Arc<World> {
    let world = World::new();
    for n in 0..AGENTS {
        world.register(&format!("agent-{n}"), &format!("cred-{n}"));
    }
    for n in 0..jobs {
        world.enqueue(&format!("job-{n:02}"));
    }
    Arc::new(world)
}

async fn race(world: &Arc<World>, polls_per_agent: usize) -> Vec<ra_engine::Assignment> {
    let tasks: Vec<_> = (0..AGENTS)
        .map(|n| {
            let world = Arc::clone(world);
            tokio::spawn(async move {
                let mut won = Vec::new();
                for _ in 0..polls_per_agent {
                    if let Some(a) = world
                        .poll(&format!("cred-{n}"), &format!("host-{n}"), n % 2 == 0)
                        .await
                    {
                        won.push(a);
                    }
                }
                won
            })
        })
        .collect();

    let mut assignments = Vec::new();
    for task in tasks {
        assignments.extend(task.await.unwrap());
    }
    assignments
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_job_goes_to_exactly_one_agent() {
    let world = crowded_world(1);

    let assignments = race(&world, 1).await;

    assert_eq!(assignments.len(), 1);
    let job = world.job("job-00");
    assert!(job.assigned_agent_id.is_some());
    assert_ne!(job.status, JobStatus::Created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_job_is_assigned_once() {
    let world = crowded_world(40);

    let assignments = race(&world, 4).await;

    let ids: BTreeSet<_> = assignments.iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids.len(), assignments.len(), "a job was handed out twice");
    assert_eq!(assignments.len(), 40);
    assert!(world
        .store
        .jobs()
        .iter()
        .all(|job| job.assigned_agent_id.is_some()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_acks_start_one_run() {
    let world = crowded_world(1);
    let assignment = world.poll("cred-0", "host-0", true).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let world = Arc::clone(&world);
            let assignment = assignment.clone();
            tokio::spawn(async move {
                world
                    .coordinator
                    .acknowledge(&assignment.id, &assignment.token, Some(&instance("host-0")))
                    .await
            })
        })
        .collect();

    let mut started = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() == ra_engine::AckOutcome::Started {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    assert_eq!(world.store.runs().len(), 1);
    assert_eq!(world.job("job-00").status, JobStatus::Running);
}
