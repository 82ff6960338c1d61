//! Scenario files: a room, its actors and the bytecode to boot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use scumm_formats::{BoxBlocks, BoxCoords, BoxMatrix, BoxRecord, Point};

use crate::boxes::RoomBoxes;
use crate::bytecode::ScriptBuilder;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::library::{ObjectCode, ScriptLibrary};
use crate::vars::{VarAddress, VAR_EGO};

/// Raw `BOXD`/`BOXM` payloads used instead of inline boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxFiles {
    pub boxd: PathBuf,
    #[serde(default)]
    pub boxm: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPlacement {
    pub id: i32,
    #[serde(default = "default_room")]
    pub room: i32,
    pub x: i32,
    pub y: i32,
    /// Walk speed `[x, y]`; the configured default when absent.
    #[serde(default)]
    pub speed: Option<[i32; 2]>,
    #[serde(default)]
    pub ignore_boxes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_room")]
    pub room: i32,
    #[serde(default)]
    pub boxes: Vec<BoxRecord>,
    #[serde(default)]
    pub box_matrix: BoxMatrix,
    #[serde(default)]
    pub box_files: Option<BoxFiles>,
    #[serde(default)]
    pub actors: Vec<ActorPlacement>,
    /// Global variables set before the boot script runs.
    #[serde(default)]
    pub variables: BTreeMap<u16, i32>,
    #[serde(default)]
    pub global_scripts: BTreeMap<u16, Vec<u8>>,
    #[serde(default)]
    pub local_scripts: BTreeMap<u16, Vec<u8>>,
    #[serde(default)]
    pub objects: BTreeMap<u16, ObjectCode>,
    pub boot_script: u16,
    #[serde(default)]
    pub boot_args: Vec<i32>,
}

fn default_room() -> i32 {
    1
}

impl Scenario {
    /// Loads a scenario; box file paths are taken relative to its directory.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let mut scenario: Scenario = serde_json::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        if let (Some(files), Some(dir)) = (scenario.box_files.as_mut(), path.parent()) {
            files.boxd = dir.join(&files.boxd);
            files.boxm = files.boxm.as_ref().map(|boxm| dir.join(boxm));
        }
        Ok(scenario)
    }

    /// Three boxes in a row and a boot script that walks actor 1 from the
    /// first to the last inside a skippable cutscene.
    pub fn demo() -> Result<Self> {
        let boxes = vec![
            BoxRecord::new(BoxCoords::rect(0, 100, 80, 140)),
            BoxRecord::new(BoxCoords::rect(80, 100, 160, 140)),
            BoxRecord::new(BoxCoords::rect(160, 100, 240, 140)),
        ];
        let box_matrix = BoxMatrix::from_groups([
            vec![(0, 0, 0), (1, 2, 1)],
            vec![(0, 0, 0), (1, 1, 1), (2, 2, 2)],
            vec![(0, 1, 1), (2, 2, 2)],
        ]);

        let mut boot = ScriptBuilder::new();
        let skip = boot.label();
        boot.set_var(VarAddress::Global(VAR_EGO), 1)
            .cutscene(&[])
            .begin_override(skip)
            .walk_actor_to(1, 200, 120)
            .wait_for_actor(1)
            .pan_camera_to(160)
            .wait_for_camera()
            .end_override();
        boot.bind(skip)
            .put_actor(1, 200, 120)
            .end_cutscene()
            .stop();

        Ok(Scenario {
            name: "demo corridor".to_string(),
            room: 1,
            boxes,
            box_matrix,
            box_files: None,
            actors: vec![ActorPlacement {
                id: 1,
                room: 1,
                x: 40,
                y: 120,
                speed: None,
                ignore_boxes: false,
            }],
            variables: BTreeMap::new(),
            global_scripts: BTreeMap::from([(1, boot.finish()?)]),
            local_scripts: BTreeMap::new(),
            objects: BTreeMap::new(),
            boot_script: 1,
            boot_args: Vec::new(),
        })
    }

    pub fn room_boxes(&self) -> Result<RoomBoxes> {
        match &self.box_files {
            Some(files) => {
                let blocks = BoxBlocks::read_files(&files.boxd, files.boxm.as_deref())?;
                Ok(RoomBoxes::from_blocks(blocks))
            }
            None => Ok(RoomBoxes::new(self.boxes.clone(), self.box_matrix.clone())),
        }
    }

    pub fn library(&self) -> ScriptLibrary {
        let mut library = ScriptLibrary::new();
        for (number, code) in &self.global_scripts {
            library.insert_global(*number, code.clone());
        }
        for (number, code) in &self.local_scripts {
            library.insert_local(*number, code.clone());
        }
        for (object, code) in &self.objects {
            library.insert_object(*object, code.clone());
        }
        library
    }

    /// Engine with the room entered and actors placed, boot script not yet run.
    pub fn build_engine(&self, config: EngineConfig) -> Result<Engine> {
        let mut engine = Engine::new(config, self.library());
        for (&index, &value) in &self.variables {
            engine.vars_mut().set_global(index, value);
        }
        engine.set_room(self.room, self.room_boxes()?);

        for placement in &self.actors {
            let id = placement.id;
            if let Some([speed_x, speed_y]) = placement.speed {
                engine
                    .set_actor_walk_speed(id, speed_x, speed_y)
                    .with_context(|| format!("setting walk speed of actor {id}"))?;
            }
            if placement.ignore_boxes {
                engine
                    .set_actor_ignore_boxes(id, true)
                    .with_context(|| format!("releasing actor {id} from boxes"))?;
            }
            engine
                .put_actor(id, Point::new(placement.x, placement.y), placement.room)
                .with_context(|| format!("placing actor {id}"))?;
        }
        Ok(engine)
    }

    pub fn boot(&self, engine: &mut Engine) -> Result<()> {
        engine
            .run_script(self.boot_script, false, false, &self.boot_args)
            .with_context(|| format!("running boot script {}", self.boot_script))
    }
}
