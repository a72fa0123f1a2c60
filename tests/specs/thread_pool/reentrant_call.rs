//! A worker calling `WorkerPool::call` back into its own pool must not
//! deadlock: the job runs inline on the calling worker thread instead of
//! being posted and waited on.

use std::sync::Arc;

use clypsalot_core::WorkerPool;

use crate::prelude::*;

#[test]
fn call_from_a_worker_thread_runs_inline_instead_of_deadlocking() {
    let pool = pool(1);

    let result = pool.call({
        let pool = Arc::clone(&pool);
        move || pool.call(|| 1 + 1)
    });

    assert_eq!(result, 2);
}

#[test]
fn an_object_hook_can_call_back_into_the_pool_that_is_running_it() {
    let pool = pool(1);
    let object = new_object(&pool, "node", CallBackHooks { pool: Arc::clone(&pool) });
    object.configure(&clypsalot_core::ObjectConfig::new()).unwrap();

    object.start().unwrap();
    wait_for(|| object.state() == clypsalot_core::ObjectState::Stopped);
}

struct CallBackHooks {
    pool: Arc<WorkerPool>,
}

impl clypsalot_core::ObjectHooks for CallBackHooks {
    fn process(&self, _object: &clypsalot_core::Object) -> Result<clypsalot_core::ProcessResult, clypsalot_core::Error> {
        let doubled = self.pool.call(|| 21 * 2);
        assert_eq!(doubled, 42);
        Ok(clypsalot_core::ProcessResult::EndOfData)
    }
}
