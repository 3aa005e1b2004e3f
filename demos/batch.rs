//! Example: Batched fan-out with cascading cancellation

use std::time::Duration;

use taskline::{BatchActionBuilder, BatchResultTask, PartialGroup, SubstrateBuilder};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskline=info".into()))
        .init();

    let substrate = SubstrateBuilder::new().thread_name_prefix("batch").build();

    // Ten records in groups of four; the trailing two are emitted as a last group
    let batch = BatchActionBuilder::new(4)
        .partial_group(PartialGroup::Emit)
        .error_handler(|err| println!("Batch failed: {err}"))
        .on_cancellation(|report| {
            println!(
                "Group {} failed, cancelled {} of {} other groups",
                report.failed_group, report.cancelled, report.attempted
            )
        })
        .spawn(&substrate, 0..10, |record: u32| {
            if record == 5 {
                return Err(format!("record {record} is malformed").into());
            }
            taskline::sleep(Duration::from_millis(50 * u64::from(record)))?;
            println!("Stored record {record}");
            Ok(())
        });

    batch.wait();
    println!("Groups {:?}: {}", batch.group_sizes(), batch.status());
    for (index, group) in batch.children().iter().enumerate() {
        println!("  group {index}: {}", group.status());
    }

    // Five replicas of the same probe, collected in order
    let probes = BatchResultTask::of(&substrate, 5, 2, || {
        taskline::sleep(Duration::from_millis(20))?;
        Ok(200u16)
    })
    .with_completion(|status| status.or(Some(503)));

    println!("Probes {:?}: {:?}", probes.groups(), probes.get());
}
