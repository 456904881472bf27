/// Word index into the machine memory
pub type Address = usize;

/// Number of symbol cells in one word
pub const WORD_CELLS: usize = 4;

/// Total size of the machine memory, in words
pub const MEMORY_WORDS: usize = 100;

/// Words per page, and per physical frame
pub const PAGE_SIZE: usize = 10;

/// Number of physical frames in the pool
pub const FRAME_COUNT: usize = MEMORY_WORDS / PAGE_SIZE;

/// Length of the page table region, in words
pub const PAGE_TABLE_WORDS: usize = FRAME_COUNT;

/// Transfer sizes a single service call may move, in words.
///
/// The byte length of the data is rounded up to the nearest rung; anything
/// longer than the last rung is rejected as a bad operand.
pub const TRANSFER_LADDER: [usize; 3] = [10, 20, 30];

/// Bound on the allocator's random frame search before it gives up
pub const ALLOC_ATTEMPTS: usize = 32;
