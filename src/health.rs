//! Health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the store be reached? Failure → pulled from the load balancer. |

use http::StatusCode;
use tracing::warn;

use crate::request::Request;
use crate::response::Response;
use crate::store::Db;

/// Always `200 OK` with body `"ok"`. Touches nothing else.
pub async fn liveness(_db: Db, _req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"` when the store answers a ping, `503`
/// otherwise.
pub async fn readiness(db: Db, _req: Request) -> Response {
    match db.ping().await {
        Ok(()) => Response::text("ready"),
        Err(e) => {
            warn!("readiness check failed: {e}");
            Response::status(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
