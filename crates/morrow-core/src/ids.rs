use uuid::Uuid;

pub trait IdSource: std::fmt::Debug {
    fn next_id(&mut self) -> String;
}

#[derive(Debug, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Default)]
pub struct SequentialIds {
    issued: u64,
}

impl SequentialIds {
    pub fn starting_at(issued: u64) -> Self {
        Self { issued }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> String {
        self.issued += 1;
        format!("{:06}", self.issued)
    }
}
