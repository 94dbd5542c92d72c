use crate::http::assets::AssetRoot;
use crate::http::request::Request;
use crate::http::response::{MIME_HTML, MIME_OCTET_STREAM, Response};
use crate::sim::Simulation;

/// URL whose body is fed to the simulation.
pub const FRAME_URL: &str = "/data";

/// Builds the response for one complete request.
///
/// `/data` runs one frame and returns the frame's output; every other URL is an
/// asset lookup.
pub fn handle_request(req: &Request, sim: &mut dyn Simulation, assets: &AssetRoot) -> Response {
    if req.is_frame() {
        let output = sim.do_frame(&req.body);
        tracing::debug!(input = req.body.len(), output = output.len(), "Frame simulated");
        return Response::ok(MIME_OCTET_STREAM, output);
    }

    match assets.load(&req.url) {
        Some(bytes) => Response::ok(MIME_HTML, bytes),
        None => {
            tracing::debug!(url = %req.url, "Asset not found");
            Response::not_found()
        }
    }
}
