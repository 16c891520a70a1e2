//! Log statements get their own modules so they can be silenced by target,
//! e.g. `filters."projman::http::log::req" = "off"`.

pub(super) mod req {
    use crate::prelude::*;
    use super::super::Request;

    pub(in crate::http) fn log(req: &Request) {
        let path = req.uri().path_and_query().map_or("", |pq| pq.as_str());
        trace!(method = %req.method(), path, "Incoming HTTP request");
    }
}
