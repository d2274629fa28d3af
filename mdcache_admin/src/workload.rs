// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Synthetic mailbox metadata used to warm up and exercise a cache manager

use mdcache::records::{AclEntry, AclList, ObjectRecord, PropValue};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub(crate) const PR_SUBJECT: u32 = 0x0037001f;
pub(crate) const PR_MESSAGE_SIZE: u32 = 0x0e080003;
pub(crate) const PR_SOURCE_KEY: u32 = 0x65e00102;

const MAPI_FOLDER: u32 = 3;
const MAPI_MESSAGE: u32 = 5;

/// The metadata of one message (or folder) as the server would cache it
#[derive(Debug, Clone)]
pub(crate) struct WorkloadItem {
    pub(crate) obj_id: u32,
    pub(crate) object: ObjectRecord,
    pub(crate) acls: AclList,
    pub(crate) props: Vec<(u32, PropValue)>,
    pub(crate) source_key: Vec<u8>,
}

/// Generate `count` objects laid out as folders of 50 messages each
pub(crate) fn generate_items(count: u32, seed: u64) -> Vec<WorkloadItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=count)
        .map(|obj_id| {
            let is_folder = obj_id % 50 == 1;
            let parent = if is_folder { 1 } else { obj_id - (obj_id - 1) % 50 };
            let subject_len = rng.gen_range(8..80);
            let subject: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(subject_len)
                .map(char::from)
                .collect();
            let acls = if is_folder {
                AclList(vec![AclEntry {
                    user_id: rng.gen_range(2..100),
                    acl_type: 2,
                    rights: 0x1fb,
                }])
            } else {
                AclList::default()
            };
            let mut source_key = obj_id.to_be_bytes().to_vec();
            source_key.extend((0..18).map(|_| rng.gen::<u8>()));

            WorkloadItem {
                obj_id,
                object: ObjectRecord {
                    parent,
                    owner: 2,
                    flags: 0,
                    obj_type: if is_folder { MAPI_FOLDER } else { MAPI_MESSAGE },
                },
                acls,
                props: vec![
                    (PR_SUBJECT, PropValue::Unicode(subject)),
                    (PR_MESSAGE_SIZE, PropValue::Long(rng.gen_range(512..1 << 20))),
                ],
                source_key,
            }
        })
        .collect()
}

/// Pick `count` object ids to look up, about one in ten of them unknown
pub(crate) fn generate_lookups(objects: u32, count: u32, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let upper = objects.saturating_add(objects / 9).max(1);
    (0..count).map(|_| rng.gen_range(1..=upper)).collect()
}
